//! Drug-model document import.
//!
//! [`DrugModelImporter`] turns a `.tdd` XML document into a [`DrugModel`]
//! graph, collecting every problem it encounters instead of stopping at
//! the first one. The importer owns its PK-model and hardcoded-operation
//! catalogs; nothing here touches global state, so independent instances
//! can run in parallel.

pub mod diagnostics;
mod grammar;
pub mod scalars;

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use crate::model::{DrugModel, Operation};
use crate::pkmodel::PkModelCollection;
use crate::operation::OperationCatalog;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Outcome classification of an import attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    /// The file could not be read, or its content is not well-formed XML.
    CantOpenFile,
    /// The XML is well-formed but the document violates the grammar.
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("cannot open drug model file: {0}")]
    CantOpenFile(#[from] std::io::Error),

    #[error("cannot open drug model file: {0}")]
    UnparsableFile(roxmltree::Error),

    #[error("The XML is not valid.")]
    InvalidXml(#[from] roxmltree::Error),

    #[error("{}", render_diagnostics(.0))]
    Invalid(Vec<Diagnostic>),
}

impl ImportError {
    pub fn status(&self) -> Status {
        match self {
            ImportError::CantOpenFile(_) | ImportError::UnparsableFile(_) => Status::CantOpenFile,
            ImportError::InvalidXml(_) | ImportError::Invalid(_) => Status::Error,
        }
    }

    /// Diagnostics collected before the import gave up, if any.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            ImportError::Invalid(entries) => entries,
            _ => &[],
        }
    }
}

fn render_diagnostics(entries: &[Diagnostic]) -> String {
    if entries.is_empty() {
        return "drug model import failed".to_string();
    }
    entries
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

// ────────────────────────────────────────────────────────────────────────────
// Importer
// ────────────────────────────────────────────────────────────────────────────

pub struct DrugModelImporter {
    pk_models: PkModelCollection,
    operations: OperationCatalog,
    // Serializes imports on one instance. Separate instances never share
    // state and can run concurrently.
    lock: Mutex<()>,
}

impl Default for DrugModelImporter {
    fn default() -> Self {
        Self::new(PkModelCollection::standard(), OperationCatalog::standard())
    }
}

impl DrugModelImporter {
    pub fn new(pk_models: PkModelCollection, operations: OperationCatalog) -> Self {
        DrugModelImporter {
            pk_models,
            operations,
            lock: Mutex::new(()),
        }
    }

    /// Reads and imports a `.tdd` file.
    ///
    /// A file that cannot be read or is not well-formed XML reports
    /// [`Status::CantOpenFile`]; grammar violations report
    /// [`Status::Error`].
    pub fn import_from_file<P: AsRef<Path>>(&self, path: P) -> Result<DrugModel, ImportError> {
        let content = std::fs::read_to_string(path)?;
        let document = roxmltree::Document::parse(&content).map_err(ImportError::UnparsableFile)?;
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.import_document(&document)
    }

    /// Imports a complete drug-model document from an XML string.
    pub fn import_from_str(&self, xml: &str) -> Result<DrugModel, ImportError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let document = roxmltree::Document::parse(xml)?;
        self.import_document(&document)
    }

    /// Imports a standalone formula document whose root holds a single
    /// `operation` child.
    pub fn import_operation_from_str(&self, xml: &str) -> Result<Operation, ImportError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let document = roxmltree::Document::parse(xml)?;
        let root = document.root_element();

        let mut walker = grammar::Walker::new(&self.operations);
        let operation_node = if root.tag_name().name() == "operation" {
            Some(root)
        } else {
            root.children()
                .filter(|n| n.is_element())
                .find(|n| n.tag_name().name() == "operation")
        };
        let operation = match operation_node {
            Some(node) => walker.extract_operation(node),
            None => {
                walker.diags.error("<operation> not found in xml input");
                None
            }
        };
        match operation {
            Some(op) if !walker.diags.has_error() => Ok(op),
            _ => Err(ImportError::Invalid(walker.diags.into_entries())),
        }
    }

    fn import_document(&self, document: &roxmltree::Document) -> Result<DrugModel, ImportError> {
        let root = document.root_element();
        let mut walker = grammar::Walker::new(&self.operations);

        let drug_model_node = root
            .children()
            .filter(|n| n.is_element())
            .find(|n| n.tag_name().name() == "drugModel");
        let mut model = match drug_model_node {
            Some(node) => walker.extract_drug_model(node),
            None => {
                walker.diags.error("<drugModel> not found in xml input");
                None
            }
        };

        let head_node = root
            .children()
            .filter(|n| n.is_element())
            .find(|n| n.tag_name().name() == "head");
        let metadata = match head_node {
            Some(node) => walker.extract_head(node),
            None => {
                walker.diags.error("<head> not found in xml input");
                None
            }
        };

        let mut model = match (model.take(), metadata) {
            (Some(mut m), Some(meta)) if !walker.diags.has_error() => {
                m.metadata = Some(meta);
                m
            }
            _ => return Err(ImportError::Invalid(walker.diags.into_entries())),
        };

        if model.analyte_sets.is_empty() {
            walker.diags.error("No analyte group in the drug model");
            return Err(ImportError::Invalid(walker.diags.into_entries()));
        }

        self.check_analyte_conversions(&model, &mut walker.diags);
        self.resolve_pk_model(&mut model, &mut walker.diags);

        if walker.diags.has_error() {
            return Err(ImportError::Invalid(walker.diags.into_entries()));
        }
        Ok(model)
    }

    /// Every analyte conversion of every formulation has to name an
    /// analyte declared by one of the analyte sets.
    fn check_analyte_conversions(&self, model: &DrugModel, diags: &mut Diagnostics) {
        let Some(formulation_and_routes) = &model.formulation_and_routes else {
            return;
        };
        let analyte_ids = model.analyte_ids();
        for entry in &formulation_and_routes.entries {
            for conversion in &entry.analyte_conversions {
                if !analyte_ids.contains(&conversion.analyte_id.as_str()) {
                    diags.error(format!(
                        "The analyte conversion refers to an unknown analyte: {}",
                        conversion.analyte_id
                    ));
                }
            }
        }
    }

    /// Resolves the PK-model id of a single-analyte-set model against the
    /// catalog and copies the catalog's distribution and elimination
    /// descriptions into the metadata.
    fn resolve_pk_model(&self, model: &mut DrugModel, diags: &mut Diagnostics) {
        if model.analyte_sets.len() != 1 {
            // TODO: resolve the PK model of each analyte set once a
            // multi-analyte document with distinct PK models exists to
            // validate against.
            return;
        }
        let pk_model_id = &model.analyte_sets[0].pk_model_id;
        match self.pk_models.get(pk_model_id) {
            Some(entry) => {
                if let Some(metadata) = &mut model.metadata {
                    metadata.distribution = entry.distribution.clone();
                    metadata.elimination = entry.elimination.clone();
                }
            }
            None => diags.error(format!(
                "The PK model ID is not a valid one: {}",
                pk_model_id
            )),
        }
    }
}
