//! Purpose: Find the notebooks to export inside a directory.
//! Exports: `find_notebooks`, `NOTEBOOK_EXTENSION`, `HIDDEN_PREFIX`.
//! Invariants: Only direct children are listed; no recursion.
//! Invariants: Result order is sorted by path and stable across runs.
use std::fs;
use std::path::{Path, PathBuf};

use super::error::{Error, ErrorKind};

pub const NOTEBOOK_EXTENSION: &str = "ipynb";

/// Prefix of macOS resource-fork companions (`._foo.ipynb`), never notebooks.
pub const HIDDEN_PREFIX: &str = "._";

pub fn find_notebooks(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let entries = fs::read_dir(dir).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to list notebooks directory")
            .with_path(dir)
            .with_source(err)
    })?;

    let mut notebooks = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read directory entry")
                .with_path(dir)
                .with_source(err)
        })?;
        let path = entry.path();
        if is_notebook(&path) && path.is_file() {
            notebooks.push(path);
        }
    }
    notebooks.sort();
    Ok(notebooks)
}

/// Names need not be UTF-8; only the prefix and extension are inspected.
fn is_notebook(path: &Path) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    if name.as_encoded_bytes().starts_with(HIDDEN_PREFIX.as_bytes()) {
        return false;
    }
    path.extension().is_some_and(|ext| ext == NOTEBOOK_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::find_notebooks;
    use std::fs;

    fn names(paths: &[std::path::PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn lists_sorted_notebooks_only() {
        let temp = tempfile::tempdir().expect("tempdir");
        for name in ["b.ipynb", "a.ipynb", "notes.md", "c.ipynb.bak", "data.csv"] {
            fs::write(temp.path().join(name), "{}").expect("write");
        }

        let found = find_notebooks(temp.path()).expect("find");
        assert_eq!(names(&found), vec!["a.ipynb", "b.ipynb"]);
    }

    #[test]
    fn skips_resource_fork_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("._analysis.ipynb"), "junk").expect("write");
        fs::write(temp.path().join("analysis.ipynb"), "{}").expect("write");

        let found = find_notebooks(temp.path()).expect("find");
        assert_eq!(names(&found), vec!["analysis.ipynb"]);
    }

    #[test]
    fn ignores_subdirectories_and_nested_notebooks() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir(temp.path().join("dir.ipynb")).expect("mkdir");
        fs::create_dir(temp.path().join("nested")).expect("mkdir");
        fs::write(temp.path().join("nested").join("inner.ipynb"), "{}").expect("write");

        let found = find_notebooks(temp.path()).expect("find");
        assert!(found.is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn lists_notebooks_with_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let latin1 = temp.path().join(OsStr::from_bytes(b"caf\xe9.ipynb"));
        fs::write(&latin1, "{}").expect("write");
        fs::write(temp.path().join(OsStr::from_bytes(b"._caf\xe9.ipynb")), "junk").expect("write");

        let found = find_notebooks(temp.path()).expect("find");
        assert_eq!(found, vec![latin1]);
    }

    #[test]
    fn empty_directory_is_not_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(find_notebooks(temp.path()).expect("find").is_empty());
    }
}
