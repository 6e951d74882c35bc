//! Adapter layer modules for external system integration.
//!
//! Provides adapters for:
//! - Template rendering of DPS and event documents
//! - HTTP access to the national NFS-e API with mutual TLS

pub mod http_transport;
pub mod template;

pub use http_transport::{HeadResponse, HttpTransportConfig, ReqwestTransport, Transport};
pub use template::{DirectoryTemplates, TemplateRenderer};
