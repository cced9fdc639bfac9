//! Bulk loading of drug-model repositories.
//!
//! A repository is simply a directory tree containing `.tdd` files. Files
//! are imported in parallel, each on its own importer instance.

use std::path::PathBuf;

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::importer::DrugModelImporter;
use crate::model::DrugModel;

/// One successfully imported model and the file it came from.
pub struct LoadedModel {
    pub path: PathBuf,
    pub model: DrugModel,
}

/// One file that failed to import, with the rendered failure.
pub struct FailedModel {
    pub path: PathBuf,
    pub message: String,
}

pub struct ScanResult {
    pub models: Vec<LoadedModel>,
    pub failures: Vec<FailedModel>,
}

/// Imports every `.tdd` file under `dir`, recursively.
///
/// A failed file never aborts the scan; it is reported in
/// [`ScanResult::failures`] instead. The same holds for unreadable
/// directory entries encountered during the walk.
pub fn scan_directory<P: AsRef<std::path::Path>>(dir: P) -> anyhow::Result<ScanResult> {
    let mut paths: Vec<PathBuf> = Vec::new();
    let mut walk_failures: Vec<FailedModel> = Vec::new();
    for entry in WalkDir::new(&dir) {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|e| e == "tdd")
                {
                    paths.push(entry.into_path());
                }
            }
            Err(err) => {
                let path = err
                    .path()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| dir.as_ref().to_path_buf());
                tracing::warn!(path = %path.display(), %err, "cannot read directory entry");
                walk_failures.push(FailedModel {
                    path,
                    message: err.to_string(),
                });
            }
        }
    }
    paths.sort();

    let outcomes: Vec<Result<LoadedModel, FailedModel>> = paths
        .into_par_iter()
        .map(|path| {
            let importer = DrugModelImporter::default();
            match importer.import_from_file(&path) {
                Ok(model) => {
                    tracing::info!(path = %path.display(), drug_model_id = %model.drug_model_id, "imported drug model");
                    Ok(LoadedModel { path, model })
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "failed to import drug model");
                    Err(FailedModel {
                        path,
                        message: err.to_string(),
                    })
                }
            }
        })
        .collect();

    let mut result = ScanResult {
        models: Vec::new(),
        failures: walk_failures,
    };
    for outcome in outcomes {
        match outcome {
            Ok(loaded) => result.models.push(loaded),
            Err(failed) => result.failures.push(failed),
        }
    }
    Ok(result)
}
