//! External collaborators

pub mod document_renderer;

pub use document_renderer::{DocumentRenderer, LocalDocumentRenderer};
