//! Purpose: Seams to the external execution and PDF rendering engines.
//! Exports: `Executor`, `Renderer`, `ExecuteRequest`, `RenderRequest`, `RenderOptions`,
//! `NbconvertExecutor`, `WebPdfRenderer`.
//! Role: Everything that talks to `jupyter nbconvert` sits behind these two traits.
//! Invariants: Engines never touch the final output path; they only return data.
use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::debug;

use super::error::{Error, ErrorKind};
use super::jupyter::{JupyterCommand, run_bounded};
use super::notebook::{Notebook, REMOVE_CELL_TAG};

pub(crate) const EXECUTE_TIMEOUT_HINT: &str = "Raise the bound with --timeout SECS.";
pub(crate) const RENDER_TIMEOUT_HINT: &str = "Raise the bound with --render-timeout SECS.";

/// Output stem inside the private render directory. nbconvert drops an
/// `--output` suffix equal to the exporter extension, so notebook stems are not used here.
const RENDER_SCRATCH_NAME: &str = "rendered";

pub struct ExecuteRequest<'a> {
    /// Kernel working directory; relative paths in the notebook resolve here.
    pub working_dir: &'a Path,
    /// Bound for the whole notebook, not per cell.
    pub timeout: Option<Duration>,
}

pub struct RenderRequest<'a> {
    pub working_dir: &'a Path,
}

pub trait Executor {
    fn execute(&self, notebook: &Notebook, request: &ExecuteRequest<'_>) -> Result<Notebook, Error>;
}

pub trait Renderer {
    fn render_pdf(&self, notebook: &Notebook, request: &RenderRequest<'_>)
    -> Result<Vec<u8>, Error>;
}

/// Executes through `jupyter nbconvert --to notebook --execute`.
#[derive(Clone, Debug)]
pub struct NbconvertExecutor {
    jupyter: JupyterCommand,
}

impl NbconvertExecutor {
    pub fn new(jupyter: JupyterCommand) -> Self {
        Self { jupyter }
    }

    fn args(&self, timeout: Option<Duration>) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["--to", "notebook", "--execute", "--stdin", "--stdout"]
            .into_iter()
            .map(OsString::from)
            .collect();
        if let Some(timeout) = timeout {
            args.push(format!("--ExecutePreprocessor.timeout={}", timeout.as_secs().max(1)).into());
        }
        args
    }
}

impl Executor for NbconvertExecutor {
    fn execute(&self, notebook: &Notebook, request: &ExecuteRequest<'_>) -> Result<Notebook, Error> {
        let command = self
            .jupyter
            .nbconvert(self.args(request.timeout), request.working_dir);
        let stdout = run_bounded(
            command,
            notebook.to_vec()?,
            request.timeout,
            ErrorKind::Execute,
            EXECUTE_TIMEOUT_HINT,
        )?;
        Notebook::from_slice(&stdout).map_err(|err| {
            Error::new(ErrorKind::Execute)
                .with_message(format!(
                    "executed notebook could not be read back: {}",
                    err.message().unwrap_or("invalid output")
                ))
                .with_source(err)
        })
    }
}

#[derive(Clone, Debug)]
pub struct RenderOptions {
    /// Omit code-cell source from the PDF.
    pub exclude_input: bool,
    pub paginate: bool,
    /// Let nbconvert fetch a compatible Chromium when none is installed.
    pub allow_chromium_download: bool,
    pub timeout: Option<Duration>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            exclude_input: true,
            paginate: true,
            allow_chromium_download: true,
            timeout: Some(Duration::from_secs(600)),
        }
    }
}

/// Renders through nbconvert's headless-Chromium `webpdf` exporter.
#[derive(Clone, Debug)]
pub struct WebPdfRenderer {
    jupyter: JupyterCommand,
    options: RenderOptions,
}

impl WebPdfRenderer {
    pub fn new(jupyter: JupyterCommand, options: RenderOptions) -> Self {
        Self { jupyter, options }
    }

    fn args(&self, output_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--to".into(),
            "webpdf".into(),
            "--stdin".into(),
            "--output-dir".into(),
            output_dir.as_os_str().to_os_string(),
            "--output".into(),
            RENDER_SCRATCH_NAME.into(),
        ];
        if self.options.exclude_input {
            args.push("--no-input".into());
        }
        args.push(python_bool("--WebPDFExporter.paginate", self.options.paginate));
        args.push(python_bool(
            "--WebPDFExporter.allow_chromium_download",
            self.options.allow_chromium_download,
        ));
        args.push("--TagRemovePreprocessor.enabled=True".into());
        args.push(format!("--TagRemovePreprocessor.remove_cell_tags={REMOVE_CELL_TAG}").into());
        args
    }
}

impl Renderer for WebPdfRenderer {
    fn render_pdf(
        &self,
        notebook: &Notebook,
        request: &RenderRequest<'_>,
    ) -> Result<Vec<u8>, Error> {
        let scratch = tempfile::tempdir().map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to create render directory")
                .with_source(err)
        })?;
        let command = self
            .jupyter
            .nbconvert(self.args(scratch.path()), request.working_dir);
        run_bounded(
            command,
            notebook.to_vec()?,
            self.options.timeout,
            ErrorKind::Render,
            RENDER_TIMEOUT_HINT,
        )?;

        let produced = scratch.path().join(format!("{RENDER_SCRATCH_NAME}.pdf"));
        debug!(path = %produced.display(), "reading rendered pdf");
        fs::read(&produced).map_err(|err| {
            Error::new(ErrorKind::Render)
                .with_message("renderer finished without producing a PDF")
                .with_path(&produced)
                .with_source(err)
        })
    }
}

fn python_bool(flag: &str, value: bool) -> OsString {
    let value = if value { "True" } else { "False" };
    format!("{flag}={value}").into()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::{Cell, RefCell};
    use std::path::PathBuf;

    use super::{ExecuteRequest, Executor, RenderRequest, Renderer};
    use crate::core::error::{Error, ErrorKind};
    use crate::core::notebook::Notebook;

    /// Fails any notebook whose source mentions `fail_marker`, with
    /// `fail_kind` (`Execute` unless set).
    #[derive(Default)]
    pub struct FakeExecutor {
        pub calls: Cell<usize>,
        pub fail_marker: Option<String>,
        pub fail_kind: Option<ErrorKind>,
        pub last_working_dir: RefCell<Option<PathBuf>>,
    }

    impl FakeExecutor {
        pub fn failing_on(marker: &str) -> Self {
            Self {
                fail_marker: Some(marker.to_string()),
                ..Self::default()
            }
        }

        pub fn timing_out_on(marker: &str) -> Self {
            Self {
                fail_kind: Some(ErrorKind::Timeout),
                ..Self::failing_on(marker)
            }
        }
    }

    impl Executor for FakeExecutor {
        fn execute(
            &self,
            notebook: &Notebook,
            request: &ExecuteRequest<'_>,
        ) -> Result<Notebook, Error> {
            self.calls.set(self.calls.get() + 1);
            *self.last_working_dir.borrow_mut() = Some(request.working_dir.to_path_buf());
            if let Some(marker) = &self.fail_marker {
                if notebook
                    .cells
                    .iter()
                    .any(|cell| cell.source.text().contains(marker.as_str()))
                {
                    return Err(match self.fail_kind.unwrap_or(ErrorKind::Execute) {
                        ErrorKind::Timeout => {
                            Error::new(ErrorKind::Timeout).with_message("timed out after 600s")
                        }
                        kind => Error::new(kind).with_message("RuntimeError: boom"),
                    });
                }
            }
            Ok(notebook.clone())
        }
    }

    pub struct FakeRenderer {
        pub calls: Cell<usize>,
        pub bytes: Vec<u8>,
        pub saw_setup_cell: Cell<bool>,
    }

    impl Default for FakeRenderer {
        fn default() -> Self {
            Self {
                calls: Cell::new(0),
                bytes: b"%PDF-1.7 fake".to_vec(),
                saw_setup_cell: Cell::new(false),
            }
        }
    }

    impl Renderer for FakeRenderer {
        fn render_pdf(
            &self,
            notebook: &Notebook,
            _request: &RenderRequest<'_>,
        ) -> Result<Vec<u8>, Error> {
            self.calls.set(self.calls.get() + 1);
            self.saw_setup_cell.set(notebook.has_setup_cell());
            Ok(self.bytes.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        EXECUTE_TIMEOUT_HINT, JupyterCommand, NbconvertExecutor, RENDER_TIMEOUT_HINT,
        RenderOptions, WebPdfRenderer,
    };
    use std::ffi::OsString;
    use std::path::Path;
    use std::time::Duration;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn executor_passes_timeout_to_nbconvert() {
        let executor = NbconvertExecutor::new(JupyterCommand::default());
        let args = strings(executor.args(Some(Duration::from_secs(600))));
        assert_eq!(&args[..5], ["--to", "notebook", "--execute", "--stdin", "--stdout"]);
        assert!(args.contains(&"--ExecutePreprocessor.timeout=600".to_string()));

        let args = strings(executor.args(None));
        assert!(!args.iter().any(|arg| arg.starts_with("--ExecutePreprocessor")));
    }

    #[test]
    fn renderer_hides_input_and_setup_cell() {
        let renderer = WebPdfRenderer::new(JupyterCommand::default(), RenderOptions::default());
        let args = strings(renderer.args(Path::new("/tmp/render")));

        assert_eq!(&args[..3], ["--to", "webpdf", "--stdin"]);
        assert!(args.windows(2).any(|w| w == ["--output-dir", "/tmp/render"]));
        assert!(args.windows(2).any(|w| w == ["--output", "rendered"]));
        assert!(args.contains(&"--no-input".to_string()));
        assert!(args.contains(&"--WebPDFExporter.paginate=True".to_string()));
        assert!(args.contains(&"--WebPDFExporter.allow_chromium_download=True".to_string()));
        assert!(args.contains(&"--TagRemovePreprocessor.remove_cell_tags=remove_cell".to_string()));
    }

    #[test]
    fn renderer_respects_download_opt_out() {
        let options = RenderOptions {
            allow_chromium_download: false,
            ..RenderOptions::default()
        };
        let renderer = WebPdfRenderer::new(JupyterCommand::default(), options);
        let args = strings(renderer.args(Path::new("out")));
        assert!(args.contains(&"--WebPDFExporter.allow_chromium_download=False".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn rendered_pdf_is_read_from_scratch_name() {
        use super::{RenderRequest, Renderer};
        use crate::core::notebook::Notebook;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        // Writes `<output-dir>/<output>.pdf`, as nbconvert does for plain names.
        let script = r#"#!/bin/sh
while [ $# -gt 0 ]; do
  case "$1" in
    --output-dir) outdir="$2"; shift ;;
    --output) name="$2"; shift ;;
  esac
  shift
done
cat >/dev/null
printf '%%PDF-1.7 scratch\n' > "$outdir/$name.pdf"
"#;
        let temp = tempfile::tempdir().expect("tempdir");
        let jupyter = temp.path().join("fake-jupyter");
        fs::write(&jupyter, script).expect("write script");
        fs::set_permissions(&jupyter, fs::Permissions::from_mode(0o755)).expect("chmod");

        let notebook = Notebook::from_slice(
            br#"{"nbformat": 4, "nbformat_minor": 5, "metadata": {}, "cells": []}"#,
        )
        .expect("notebook");
        let renderer = WebPdfRenderer::new(JupyterCommand::new(&jupyter), RenderOptions::default());
        let bytes = renderer
            .render_pdf(
                &notebook,
                &RenderRequest {
                    working_dir: temp.path(),
                },
            )
            .expect("render");
        assert!(bytes.starts_with(b"%PDF-1.7 scratch"));
    }

    #[test]
    fn timeout_hints_name_their_flag() {
        assert!(EXECUTE_TIMEOUT_HINT.contains("--timeout "));
        assert!(RENDER_TIMEOUT_HINT.contains("--render-timeout "));
    }
}
