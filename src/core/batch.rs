//! Purpose: Export a discovered notebook set, one at a time, past individual failures.
//! Exports: `export_all`, `BatchReport`, `ExportSuccess`, `ExportFailure`.
//! Invariants: Every input path yields exactly one success or one failure entry.
//! Invariants: Processing order is the input order; nothing runs concurrently.
use std::path::PathBuf;

use super::engine::{Executor, Renderer};
use super::error::Error;
use super::export::{Exported, Exporter};

#[derive(Debug)]
pub struct ExportSuccess {
    pub notebook: PathBuf,
    pub exported: Exported,
}

#[derive(Debug)]
pub struct ExportFailure {
    pub notebook: PathBuf,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub successes: Vec<ExportSuccess>,
    pub failures: Vec<ExportFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn exit_code(&self) -> i32 {
        if self.failures.is_empty() { 0 } else { 1 }
    }
}

/// Export each notebook in order, reporting each outcome as soon as it is known.
pub fn export_all<E, R, S, F>(
    exporter: &Exporter<E, R>,
    notebooks: &[PathBuf],
    mut on_success: S,
    mut on_failure: F,
) -> BatchReport
where
    E: Executor,
    R: Renderer,
    S: FnMut(&ExportSuccess),
    F: FnMut(&ExportFailure),
{
    let mut report = BatchReport::default();
    for notebook in notebooks {
        match exporter.export(notebook) {
            Ok(exported) => {
                let success = ExportSuccess {
                    notebook: notebook.clone(),
                    exported,
                };
                on_success(&success);
                report.successes.push(success);
            }
            Err(error) => {
                let failure = ExportFailure {
                    notebook: notebook.clone(),
                    error,
                };
                on_failure(&failure);
                report.failures.push(failure);
            }
        }
    }
    report
}
