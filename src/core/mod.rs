// Core modules: discovery, the notebook model, engine seams, and export orchestration.
pub mod batch;
pub mod discover;
pub mod engine;
pub mod error;
pub mod export;
pub mod jupyter;
pub mod notebook;
pub mod paths;
