//! Purpose: Library crate behind the `nbpdf` CLI: notebook discovery, execution, and PDF export.
//! Exports: `api` (stable surface over the internal `core` modules).
//! Role: Keeps the binary thin; everything testable lives here.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
mod core;
