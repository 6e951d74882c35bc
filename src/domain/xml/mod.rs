//! XML handling needed for enveloped signatures: an element tree and
//! Canonical XML 1.0 serialization.

mod c14n;
mod tree;

pub use c14n::canonicalize;
pub use tree::{split_qname, Attribute, Document, Element, Node};
