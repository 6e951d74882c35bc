//! gzip + base64 wrapping of signed XML for the JSON submission body.

use crate::domain::envelope::TransportEnvelope;
use crate::infra::error::{NfseError, NfseResult};
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

#[derive(Debug, Default, Clone, Copy)]
pub struct TransportCodec;

impl TransportCodec {
    /// gzip the UTF-8 bytes of `xml`, base64 them and place the result under
    /// `field_name`.
    pub fn encode(xml: &str, field_name: &str) -> NfseResult<TransportEnvelope> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(xml.as_bytes())?;
        let compressed = encoder.finish()?;
        let payload = base64::engine::general_purpose::STANDARD.encode(compressed);
        log::debug!(
            "Encoded {} bytes of XML into {} base64 chars for {field_name}",
            xml.len(),
            payload.len()
        );
        Ok(TransportEnvelope::new(field_name, payload))
    }

    /// Inverse of [`TransportCodec::encode`] for a single payload string.
    pub fn decode(payload: &str) -> NfseResult<String> {
        let compressed = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| NfseError::InvalidInput(format!("payload is not base64: {e}")))?;
        let mut xml = String::new();
        GzDecoder::new(compressed.as_slice()).read_to_string(&mut xml)?;
        Ok(xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::{DPS_ENVELOPE_FIELD, EVENT_ENVELOPE_FIELD};

    #[test]
    fn envelope_round_trip() {
        let xml = "<?xml version=\"1.0\" encoding=\"UTF-8\"?><DPS><infDPS Id=\"x\">São Paulo</infDPS></DPS>";
        let envelope = TransportCodec::encode(xml, DPS_ENVELOPE_FIELD).unwrap();

        let json = envelope.to_json();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 1);
        let payload = object[DPS_ENVELOPE_FIELD].as_str().unwrap();

        assert_eq!(TransportCodec::decode(payload).unwrap(), xml);
    }

    #[test]
    fn payload_is_gzip() {
        let envelope = TransportCodec::encode("<a/>", EVENT_ENVELOPE_FIELD).unwrap();
        let raw = base64::engine::general_purpose::STANDARD
            .decode(envelope.payload())
            .unwrap();
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);
        assert_eq!(envelope.field_name(), EVENT_ENVELOPE_FIELD);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(TransportCodec::decode("***").is_err());
        let not_gzip = base64::engine::general_purpose::STANDARD.encode(b"plain");
        assert!(TransportCodec::decode(&not_gzip).is_err());
    }
}
