//! Purpose: Define the public Rust API boundary for nbpdf.
//! Exports: Types and operations used by the `nbpdf` binary and integration tests.
//! Role: Additive-only surface; hides the internal module layout.
//! Invariants: This module is the only public path to core functionality.

pub use crate::core::batch::{BatchReport, ExportFailure, ExportSuccess, export_all};
pub use crate::core::discover::{HIDDEN_PREFIX, NOTEBOOK_EXTENSION, find_notebooks};
pub use crate::core::engine::{
    ExecuteRequest, Executor, NbconvertExecutor, RenderOptions, RenderRequest, Renderer,
    WebPdfRenderer,
};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::export::{
    DEFAULT_EXECUTE_TIMEOUT, ExportOptions, ExportStatus, Exported, Exporter,
};
pub use crate::core::jupyter::JupyterCommand;
pub use crate::core::notebook::{Cell, CellType, Notebook, SetupInjection, Source};
pub use crate::core::paths::{pdf_output_path, program_dir, resolve_notebooks_dir};
