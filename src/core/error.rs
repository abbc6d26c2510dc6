//! Purpose: Structured error type shared by the library and the `nbpdf` binary.
//! Exports: `Error`, `ErrorKind`, `to_exit_code`.
//! Invariants: Messages from external collaborators are carried verbatim.
//! Invariants: Exit codes are stable: 2 for setup/usage failures, 1 otherwise.
use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    NotFound,
    Io,
    Parse,
    Execute,
    Timeout,
    Render,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    path: Option<PathBuf>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            path: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Usage | ErrorKind::NotFound => 2,
        ErrorKind::Internal
        | ErrorKind::Io
        | ErrorKind::Parse
        | ErrorKind::Execute
        | ErrorKind::Timeout
        | ErrorKind::Render => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, to_exit_code};
    use std::error::Error as _;
    use std::io;

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (ErrorKind::Internal, 1),
            (ErrorKind::Usage, 2),
            (ErrorKind::NotFound, 2),
            (ErrorKind::Io, 1),
            (ErrorKind::Parse, 1),
            (ErrorKind::Execute, 1),
            (ErrorKind::Timeout, 1),
            (ErrorKind::Render, 1),
        ];

        for (kind, code) in cases {
            assert_eq!(to_exit_code(kind), code);
        }
    }

    #[test]
    fn display_includes_message_and_path() {
        let err = Error::new(ErrorKind::Execute)
            .with_message("ZeroDivisionError: division by zero")
            .with_path("notebooks/a.ipynb");
        assert_eq!(
            err.to_string(),
            "Execute: ZeroDivisionError: division by zero (path: notebooks/a.ipynb)"
        );
    }

    #[test]
    fn source_is_exposed() {
        let err = Error::new(ErrorKind::Io)
            .with_message("failed to read notebook")
            .with_source(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("denied"));
    }
}
