//! NfseClient against a recording in-memory transport.

mod common;

use async_trait::async_trait;
use common::{cancellation_data, dps_data, template_dir, TestCredential, ACCESS_KEY, DPS_ID};
use nfse_national::{
    ClientConfiguration, CredentialInput, HeadResponse, NfseClient, NfseError, NfseResult,
    SignatureVerifier, Transport, TransportCodec,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Post(String, Value),
    Get(String),
    Head(String),
}

/// Records every call; answers with `reply`, or rejects with `reject`.
#[derive(Default)]
struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    reject: Option<(u16, String)>,
}

impl RecordingTransport {
    fn rejecting(status: u16, body: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            reject: Some((status, body.to_string())),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, call: Call) -> NfseResult<Value> {
        self.calls.lock().unwrap().push(call);
        match &self.reject {
            Some((status, body)) => Err(NfseError::TransportError {
                message: "request rejected".into(),
                status: *status,
                body: body.clone(),
            }),
            None => Ok(json!({"ok": true})),
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post(&self, segments: &[&str], body: &Value) -> NfseResult<Value> {
        self.answer(Call::Post(segments.join("/"), body.clone()))
    }

    async fn get(&self, segments: &[&str]) -> NfseResult<Value> {
        self.answer(Call::Get(segments.join("/")))
    }

    async fn head(&self, segments: &[&str]) -> NfseResult<HeadResponse> {
        self.answer(Call::Head(segments.join("/")))?;
        Ok(HeadResponse {
            status: 200,
            headers: BTreeMap::new(),
        })
    }
}

fn client_with(
    transport: Arc<RecordingTransport>,
    credential: Option<&TestCredential>,
    templates: &tempfile::TempDir,
) -> NfseClient {
    let config = ClientConfiguration {
        template_dir: Some(templates.path().to_path_buf()),
        ..ClientConfiguration::default()
    };
    let input = credential.map(|c| CredentialInput::Path(c.pem_path.clone()));
    NfseClient::new(config, input, None)
        .unwrap()
        .with_transport(transport)
}

#[tokio::test]
async fn issue_posts_signed_dps_envelope() {
    let templates = template_dir();
    let credential = TestCredential::new("Issuer");
    let transport = Arc::new(RecordingTransport::default());
    let client = client_with(Arc::clone(&transport), Some(&credential), &templates);

    let response = client.issue_nfse(dps_data()).await.unwrap();
    assert_eq!(response, json!({"ok": true}));

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    let Call::Post(path, body) = &calls[0] else {
        panic!("expected POST, got {calls:?}");
    };
    assert_eq!(path, "nfse");
    let object = body.as_object().unwrap();
    assert_eq!(object.len(), 1);
    let xml = TransportCodec::decode(object["dpsXmlGZipB64"].as_str().unwrap()).unwrap();
    assert!(xml.contains(&format!("Id=\"{DPS_ID}\"")));
    assert!(SignatureVerifier::new().verify(&xml).unwrap().success());
}

#[tokio::test]
async fn issue_accepts_prepared_xml() {
    let templates = template_dir();
    let transport = Arc::new(RecordingTransport::default());
    let client = client_with(Arc::clone(&transport), None, &templates);

    client.issue_nfse("<DPS/>").await.unwrap();
    let Call::Post(_, body) = &transport.calls()[0] else {
        panic!("expected POST");
    };
    assert_eq!(
        TransportCodec::decode(body["dpsXmlGZipB64"].as_str().unwrap()).unwrap(),
        "<DPS/>"
    );
}

#[tokio::test]
async fn cancel_uses_access_key_from_data() {
    let templates = template_dir();
    let credential = TestCredential::new("Canceller");
    let transport = Arc::new(RecordingTransport::default());
    let client = client_with(Arc::clone(&transport), Some(&credential), &templates);

    client.cancel_nfse(cancellation_data(), None).await.unwrap();
    let Call::Post(path, body) = &transport.calls()[0] else {
        panic!("expected POST");
    };
    assert_eq!(path, &format!("nfse/{ACCESS_KEY}/eventos"));
    assert!(body.get("pedidoRegistroEventoXmlGZipB64").is_some());
}

#[tokio::test]
async fn cancel_requires_access_key() {
    let templates = template_dir();
    let transport = Arc::new(RecordingTransport::default());
    let client = client_with(Arc::clone(&transport), None, &templates);

    let err = client.cancel_nfse("<pedRegEvento/>", None).await.unwrap_err();
    assert!(matches!(err, NfseError::InvalidInput(_)));

    let mut data = cancellation_data();
    data.as_object_mut().unwrap().remove("chaveAcesso");
    assert!(client.cancel_nfse(data, None).await.is_err());
    assert!(transport.calls().is_empty());

    client
        .cancel_nfse("<pedRegEvento/>", Some(ACCESS_KEY))
        .await
        .unwrap();
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn queries_hit_expected_paths() {
    let templates = template_dir();
    let transport = Arc::new(RecordingTransport::default());
    let client = client_with(Arc::clone(&transport), None, &templates);

    client.get_nfse(ACCESS_KEY).await.unwrap();
    client.get_dps(DPS_ID).await.unwrap();
    let head = client.check_dps(DPS_ID).await.unwrap();
    assert_eq!(head.status, 200);

    assert_eq!(
        transport.calls(),
        vec![
            Call::Get(format!("nfse/{ACCESS_KEY}")),
            Call::Get(format!("dps/{DPS_ID}")),
            Call::Head(format!("dps/{DPS_ID}")),
        ]
    );

    assert!(matches!(
        client.get_nfse("").await,
        Err(NfseError::InvalidInput(_))
    ));
    assert!(matches!(
        client.check_dps(" ").await,
        Err(NfseError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn rejections_keep_status_and_body() {
    let templates = template_dir();
    let transport = Arc::new(RecordingTransport::rejecting(
        400,
        r#"{"erros":[{"codigo":"E0001"}]}"#,
    ));
    let client = client_with(Arc::clone(&transport), None, &templates);

    let err = client.issue_nfse("<DPS/>").await.unwrap_err();
    assert_eq!(err.http_status(), Some(400));
    assert!(err.response_body().unwrap().contains("E0001"));
    assert!(err.to_string().starts_with("Failed to issue NFS-e"));

    let err = client.get_dps(DPS_ID).await.unwrap_err();
    assert!(err.to_string().starts_with("Failed to query DPS"));
    assert_eq!(err.http_status(), Some(400));
}

#[test]
fn validation_without_schema_dir() {
    let templates = template_dir();
    let client = client_with(Arc::new(RecordingTransport::default()), None, &templates);
    assert!(matches!(
        client.validate_dps_xml("<DPS/>", None, false),
        Err(NfseError::ConfigurationError(_))
    ));
    assert!(!client.validate_event_xml("<x/>", None, true).unwrap());
}

#[cfg(unix)]
#[test]
fn validation_through_configured_xmllint() {
    let schemas = tempfile::TempDir::new().unwrap();
    let scratch = tempfile::TempDir::new().unwrap();
    let config = ClientConfiguration {
        schema_dir: Some(schemas.path().to_path_buf()),
        xmllint_path: "false".into(),
        scratch_dir: Some(scratch.path().to_path_buf()),
        ..ClientConfiguration::default()
    };
    let client = NfseClient::new(config, None, None).unwrap();

    match client.validate_dps_xml("<DPS/>", None, false) {
        Err(NfseError::ValidationError { schema, .. }) => assert_eq!(schema, "DPS_v1.00.xsd"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(!client
        .validate_event_xml("<x/>", Some("custom.xsd"), true)
        .unwrap());
    assert!(std::fs::read_dir(scratch.path()).unwrap().next().is_none());
}

#[test]
fn numeric_id_is_bound_to_rendered_element() {
    let templates = template_dir();
    let credential = TestCredential::new("Numeric Id");
    let client = client_with(
        Arc::new(RecordingTransport::default()),
        Some(&credential),
        &templates,
    );

    let mut data = dps_data();
    data["id"] = json!(42);
    let generated = client
        .generate_dps_xml(&data, nfse_national::GenerateOptions::default())
        .unwrap();
    assert!(generated.signed);
    assert!(generated.xml.contains("<Reference URI=\"#42\">"));
    assert!(SignatureVerifier::new().verify(&generated.xml).unwrap().success());
}
