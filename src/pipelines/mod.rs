//! Workflow pipelines orchestrating stateless services.

pub mod document;

pub use document::{DocumentPipeline, GenerateOptions, GeneratedDocument, UNSIGNED_WARNING};
