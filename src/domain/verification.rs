//! Verification domain types for signed DPS/event documents.
//!
//! Aggregates the outcome of checking an enveloped XML signature. The
//! cryptographic work lives in the verifier service; this type is the
//! reporting contract handed to callers and the CLI.

/// Result of verifying an enveloped XML-DSig signature.
///
/// - `reference_found`: the element named by the Reference URI exists
/// - `digest_ok`: recomputed SHA-1 over the canonical element matches `DigestValue`
/// - `signature_ok`: `SignatureValue` verifies over the canonical `SignedInfo`
///   with the embedded certificate's public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub reference_found: bool,
    pub digest_ok: bool,
    pub signature_ok: bool,
    /// Reference URI as found in the document, e.g. `#DPS3304557...`.
    pub reference_uri: String,
}

impl VerificationReport {
    #[must_use]
    pub fn new(
        reference_uri: impl Into<String>,
        reference_found: bool,
        digest_ok: bool,
        signature_ok: bool,
    ) -> Self {
        Self {
            reference_found,
            digest_ok,
            signature_ok,
            reference_uri: reference_uri.into(),
        }
    }

    /// Overall success indicator - true only if every check passed.
    #[must_use]
    pub fn success(&self) -> bool {
        self.reference_found && self.digest_ok && self.signature_ok
    }
}
