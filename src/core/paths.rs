//! Purpose: Notebook-directory resolution and PDF output path derivation.
//! Exports: `resolve_notebooks_dir`, `program_dir`, `pdf_output_path`.
//! Role: Keep CLI and exporter path semantics aligned from one source.
//! Invariants: Absolute notebook directories are never reinterpreted.
//! Invariants: Output stem always equals the notebook stem.

use std::path::{Path, PathBuf};

use super::error::{Error, ErrorKind};

pub const PDF_EXTENSION: &str = "pdf";

/// Directory containing the running executable, if it can be determined.
pub fn program_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let exe = exe.canonicalize().unwrap_or(exe);
    exe.parent().map(Path::to_path_buf)
}

/// Pick the directory to scan for `requested`.
///
/// The path is first taken as given (relative to the working directory). A
/// relative path that does not name a directory is retried against
/// `program_dir` and then its parent, so the tool works when launched from
/// anywhere.
pub fn resolve_notebooks_dir(
    requested: &Path,
    program_dir: Option<&Path>,
) -> Result<PathBuf, Error> {
    if requested.is_dir() {
        return Ok(requested.to_path_buf());
    }
    if !requested.is_absolute() {
        if let Some(base) = program_dir {
            let candidates = std::iter::once(base).chain(base.parent());
            for root in candidates {
                let candidate = root.join(requested);
                if candidate.is_dir() {
                    return Ok(candidate.canonicalize().unwrap_or(candidate));
                }
            }
        }
    }
    Err(Error::new(ErrorKind::NotFound)
        .with_message(format!(
            "notebooks directory not found: {}",
            requested.display()
        ))
        .with_hint("Pass --notebooks-dir with an existing directory."))
}

/// `<output_dir>/<stem>.pdf` for the notebook at `notebook`.
pub fn pdf_output_path(notebook: &Path, output_dir: &Path) -> Result<PathBuf, Error> {
    let stem = notebook.file_stem().ok_or_else(|| {
        Error::new(ErrorKind::Usage)
            .with_message("notebook path has no file name")
            .with_path(notebook)
    })?;
    let mut name = stem.to_os_string();
    name.push(".");
    name.push(PDF_EXTENSION);
    Ok(output_dir.join(name))
}
