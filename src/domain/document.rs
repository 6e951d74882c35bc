//! Document kinds, pipeline stages and the rendered/signed document types.

use crate::domain::constants::{
    DPS_ENVELOPE_FIELD, DPS_SCHEMA, EVENT_ENVELOPE_FIELD, EVENT_SCHEMA, XML_DECLARATION,
};
use std::fmt;

/// Kinds of documents the exchange accepts, with their fixed layout data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Declaração de Prestação de Serviço, submitted to issue an NFS-e.
    Dps,
    /// Event-registration request cancelling an issued NFS-e.
    Cancellation,
}

impl DocumentKind {
    /// Template identifier handed to the renderer.
    #[must_use]
    pub fn template_id(self) -> &'static str {
        match self {
            DocumentKind::Dps => "dps.xml",
            DocumentKind::Cancellation => "dps_cancelamento.xml",
        }
    }

    /// Local name of the element the signature reference points at.
    #[must_use]
    pub fn signed_element(self) -> &'static str {
        match self {
            DocumentKind::Dps => "infDPS",
            DocumentKind::Cancellation => "infPedReg",
        }
    }

    /// Default schema file.
    #[must_use]
    pub fn schema(self) -> &'static str {
        match self {
            DocumentKind::Dps => DPS_SCHEMA,
            DocumentKind::Cancellation => EVENT_SCHEMA,
        }
    }

    /// JSON field carrying the compressed document.
    #[must_use]
    pub fn envelope_field(self) -> &'static str {
        match self {
            DocumentKind::Dps => DPS_ENVELOPE_FIELD,
            DocumentKind::Cancellation => EVENT_ENVELOPE_FIELD,
        }
    }

    /// Prefix for validator scratch files.
    #[must_use]
    pub fn scratch_prefix(self) -> &'static str {
        match self {
            DocumentKind::Dps => "dps",
            DocumentKind::Cancellation => "evento",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Dps => write!(f, "DPS"),
            DocumentKind::Cancellation => write!(f, "cancellation event"),
        }
    }
}

/// Stages of one document-generation call, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Rendering,
    Minifying,
    Signing,
    Validating,
    Encoding,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Rendering => "Rendering",
            PipelineStage::Minifying => "Minifying",
            PipelineStage::Signing => "Signing",
            PipelineStage::Validating => "Validating",
            PipelineStage::Encoding => "Encoding",
        };
        f.write_str(name)
    }
}

/// Element the signature covers: first element with `local_name`, bound
/// through the fragment URI `#id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceTarget {
    pub local_name: String,
    pub id: String,
}

impl ReferenceTarget {
    #[must_use]
    pub fn new(local_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            local_name: local_name.into(),
            id: id.into(),
        }
    }

    #[must_use]
    pub fn for_kind(kind: DocumentKind, id: impl Into<String>) -> Self {
        Self::new(kind.signed_element(), id)
    }

    /// `#id`, or empty while the id is unresolved.
    #[must_use]
    pub fn uri(&self) -> String {
        if self.id.is_empty() {
            String::new()
        } else {
            format!("#{}", self.id)
        }
    }
}

/// Raw template output, minified before signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument(String);

impl RenderedDocument {
    #[must_use]
    pub fn new(xml: impl Into<String>) -> Self {
        Self(xml.into())
    }

    /// Drop inter-tag whitespace and surrounding whitespace.
    #[must_use]
    pub fn minified(self) -> Self {
        Self(minify_xml(&self.0))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

/// XML carrying an enveloped `<Signature>`, always with an XML declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDocument(String);

impl SignedDocument {
    /// Wrap signer output, prepending the declaration if it is missing.
    #[must_use]
    pub fn new(xml: String) -> Self {
        if xml.trim_start().starts_with("<?xml") {
            Self(xml)
        } else {
            Self(format!("{XML_DECLARATION}{xml}"))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

/// Remove whitespace runs sitting strictly between `>` and `<`, then trim.
/// Text and attribute content elsewhere is untouched; idempotent.
#[must_use]
pub fn minify_xml(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut chars = xml.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        out.push(c);
        if c != '>' {
            continue;
        }
        let rest = &xml[i + 1..];
        let ws_len: usize = rest
            .chars()
            .take_while(|ch| ch.is_whitespace())
            .map(char::len_utf8)
            .sum();
        if ws_len > 0 && rest[ws_len..].starts_with('<') {
            while chars.peek().is_some_and(|(j, _)| *j < i + 1 + ws_len) {
                chars.next();
            }
        }
    }
    out.trim().to_string()
}
