use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

use tddmodel::importer::{DrugModelImporter, Severity};
use tddmodel::repository;

#[derive(Parser, Debug)]
#[command(author, version, about = "Parse drug model .tdd XML documents to JSON", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse one document and print the model as JSON
    Parse {
        /// Drug model .tdd file
        #[arg(value_name = "TDD_FILE")]
        file: Utf8PathBuf,
    },
    /// Validate one document and list all diagnostics
    Check {
        /// Drug model .tdd file
        #[arg(value_name = "TDD_FILE")]
        file: Utf8PathBuf,
    },
    /// Import every .tdd file under a directory and print a summary
    Scan {
        /// Repository directory
        #[arg(value_name = "DIR")]
        dir: Utf8PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Parse { file } => {
            let importer = DrugModelImporter::default();
            let model = importer
                .import_from_file(&file)
                .with_context(|| format!("Failed to import {}", file))?;
            let json = serde_json::to_string_pretty(&model)?;
            println!("{}", json);
        }
        Command::Check { file } => {
            let importer = DrugModelImporter::default();
            match importer.import_from_file(&file) {
                Ok(model) => {
                    println!("{}: ok ({})", file, model.drug_model_id);
                }
                Err(err) => {
                    let diagnostics = err.diagnostics();
                    if diagnostics.is_empty() {
                        eprintln!("{}: {}", file, err);
                    } else {
                        for diagnostic in diagnostics {
                            eprintln!("{}: {}", file, diagnostic);
                        }
                    }
                    let errors = diagnostics
                        .iter()
                        .filter(|d| d.severity == Severity::Error)
                        .count();
                    eprintln!("{}: {} error(s)", file, errors.max(1));
                    std::process::exit(1);
                }
            }
        }
        Command::Scan { dir } => {
            let result = repository::scan_directory(&dir)
                .with_context(|| format!("Failed to scan {}", dir))?;
            for loaded in &result.models {
                println!(
                    "{}\t{}\t{}",
                    loaded.path.display(),
                    loaded.model.drug_id,
                    loaded.model.drug_model_id
                );
            }
            for failed in &result.failures {
                eprintln!("{}: {}", failed.path.display(), failed.message);
            }
            println!(
                "{} model(s) imported, {} failure(s)",
                result.models.len(),
                result.failures.len()
            );
            if !result.failures.is_empty() {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
