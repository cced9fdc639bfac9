//! Drug-model (`.tdd`) document importer.
//!
//! This crate provides a [`DrugModelImporter`](importer::DrugModelImporter)
//! to load and validate drug-model XML documents into strongly-typed Rust
//! structures, collecting structured diagnostics along the way.
//!
//! The binary `tddmodel` demonstrates usage: it parses documents to JSON,
//! checks them, and scans whole repositories.

pub mod importer;
pub mod model;
pub mod operation;
pub mod pkmodel;
pub mod repository;
pub mod unit;

pub use importer::{DrugModelImporter, ImportError, Status};
pub use model::{DrugModel, DrugModelDoc};
