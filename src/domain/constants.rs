//! Centralized protocol literals: XML-DSig algorithm URIs, identifier prefixes,
//! PEM markers and envelope field names.
//! Keep this intentionally small; only broadly reused literals should live here.

// === XML-DSig profile (mandated by the national layout, not configurable) ===

/// XML-DSig namespace, declared as the default namespace on `<Signature>`
pub const XMLDSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// Canonical XML 1.0 without comments
pub const C14N_ALGORITHM: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";

/// RSA with SHA-1
pub const RSA_SHA1_ALGORITHM: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";

/// SHA-1 digest
pub const SHA1_DIGEST_ALGORITHM: &str = "http://www.w3.org/2000/09/xmldsig#sha1";

/// Enveloped-signature transform
pub const ENVELOPED_SIGNATURE_TRANSFORM: &str =
    "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// Declaration prepended to signed output when the template omitted one
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Namespace bound to the reserved `xml` prefix
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

// === Identifiers ===

/// Prefix of a DPS identifier
pub const DPS_ID_PREFIX: &str = "DPS";

/// Prefix of an event-registration request identifier
pub const EVENT_ID_PREFIX: &str = "PRE";

/// Event code for cancellation requests
pub const CANCELLATION_EVENT_CODE: &str = "101101";

/// Width of the zero-padded DPS series
pub const DPS_SERIES_WIDTH: usize = 5;

/// Width of the zero-padded DPS number
pub const DPS_NUMBER_WIDTH: usize = 15;

/// Length of a DPS id built from a 14-digit CNPJ
pub const DPS_ID_LEN: usize = 45;

/// Length of an access key
pub const ACCESS_KEY_LEN: usize = 50;

/// Length of an event id
pub const EVENT_ID_LEN: usize = 59;

// === Credentials ===

/// Marker identifying a PEM certificate block
pub const PEM_CERTIFICATE_MARKER: &str = "-----BEGIN CERTIFICATE";

/// Marker shared by every PEM private key block flavour
pub const PEM_PRIVATE_KEY_MARKER: &str = "PRIVATE KEY";

// === Transport envelope field names ===

/// JSON field carrying a compressed DPS
pub const DPS_ENVELOPE_FIELD: &str = "dpsXmlGZipB64";

/// JSON field carrying a compressed event-registration request
pub const EVENT_ENVELOPE_FIELD: &str = "pedidoRegistroEventoXmlGZipB64";

// === Schemas ===

/// Published DPS schema
pub const DPS_SCHEMA: &str = "DPS_v1.00.xsd";

/// Published event-registration schema
pub const EVENT_SCHEMA: &str = "pedRegEvento_v1.00.xsd";
