//! Pure domain types and algorithms: identifiers, credentials, documents,
//! the transport envelope and XML canonicalization.

pub mod constants;
pub mod credential;
pub mod document;
pub mod envelope;
pub mod identifiers;
pub mod verification;
pub mod xml;
