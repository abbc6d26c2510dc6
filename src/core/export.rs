//! Purpose: Turn one notebook into one PDF.
//! Exports: `Exporter`, `ExportOptions`, `Exported`, `ExportStatus`, `DEFAULT_EXECUTE_TIMEOUT`.
//! Role: Per-notebook pipeline: existence check, load, setup cell, execute, render, write.
//! Invariants: A failed export never creates or modifies the output file.
//! Invariants: An existing PDF is left alone unless overwrite is set.
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::engine::{ExecuteRequest, Executor, RenderRequest, Renderer};
use super::error::{Error, ErrorKind};
use super::notebook::{Notebook, SetupInjection};
use super::paths::pdf_output_path;

pub const DEFAULT_EXECUTE_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Clone, Debug)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    pub overwrite: bool,
    pub execute: bool,
    pub timeout: Option<Duration>,
}

impl ExportOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            overwrite: false,
            execute: true,
            timeout: Some(DEFAULT_EXECUTE_TIMEOUT),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExportStatus {
    Written,
    /// The PDF already existed and overwrite was off.
    Skipped,
}

#[derive(Clone, Debug)]
pub struct Exported {
    pub path: PathBuf,
    pub status: ExportStatus,
}

pub struct Exporter<E, R> {
    executor: E,
    renderer: R,
    options: ExportOptions,
}

impl<E: Executor, R: Renderer> Exporter<E, R> {
    pub fn new(executor: E, renderer: R, options: ExportOptions) -> Self {
        Self {
            executor,
            renderer,
            options,
        }
    }

    pub fn export(&self, notebook_path: &Path) -> Result<Exported, Error> {
        let out_path = pdf_output_path(notebook_path, &self.options.output_dir)?;
        if out_path.exists() && !self.options.overwrite {
            debug!(path = %out_path.display(), "pdf exists, skipping");
            return Ok(Exported {
                path: out_path,
                status: ExportStatus::Skipped,
            });
        }

        let mut notebook = Notebook::load(notebook_path)?;
        match notebook.inject_plotting_setup() {
            SetupInjection::Inserted | SetupInjection::AlreadyPresent => {}
            SetupInjection::SkippedLanguage(language) => warn!(
                notebook = %notebook_path.display(),
                %language,
                "plotting setup skipped for non-Python kernel"
            ),
        }

        let working_dir = notebook_dir(notebook_path);
        if self.options.execute {
            debug!(notebook = %notebook_path.display(), "executing");
            let request = ExecuteRequest {
                working_dir: &working_dir,
                timeout: self.options.timeout,
            };
            notebook = self.executor.execute(&notebook, &request)?;
        }

        let request = RenderRequest {
            working_dir: &working_dir,
        };
        let bytes = self.renderer.render_pdf(&notebook, &request)?;
        if bytes.is_empty() {
            return Err(Error::new(ErrorKind::Render).with_message("renderer produced an empty PDF"));
        }

        write_pdf(&out_path, &bytes)?;
        info!(path = %out_path.display(), bytes = bytes.len(), "wrote pdf");
        Ok(Exported {
            path: out_path,
            status: ExportStatus::Written,
        })
    }
}

fn notebook_dir(notebook_path: &Path) -> PathBuf {
    match notebook_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Write through a sibling temp file and rename it into place.
///
/// The result gets the mode a plain create would: an existing target keeps
/// its permissions, a new one gets `0o666` less the umask.
fn write_pdf(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let io_error = |message: &str, err: std::io::Error| {
        Error::new(ErrorKind::Io)
            .with_message(message)
            .with_path(path)
            .with_source(err)
    };

    fs::create_dir_all(dir).map_err(|err| io_error("failed to create output directory", err))?;
    let mut builder = tempfile::Builder::new();
    builder.prefix(".nbpdf-").suffix(".pdf.tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let mut tmp = builder
        .tempfile_in(dir)
        .map_err(|err| io_error("failed to create temporary pdf", err))?;
    if let Ok(existing) = fs::metadata(path) {
        tmp.as_file()
            .set_permissions(existing.permissions())
            .map_err(|err| io_error("failed to copy pdf permissions", err))?;
    }
    tmp.write_all(bytes)
        .map_err(|err| io_error("failed to write pdf", err))?;
    tmp.persist(path)
        .map_err(|err| io_error("failed to move pdf into place", err.error))?;
    Ok(())
}
