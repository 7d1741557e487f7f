//! HTTP-level tests for the Gemini transformer and the session flow on top of it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use magiclens::{
    Credential, CredentialError, CredentialHolder, CredentialOrigin, FlowStep, GeminiModel,
    GeminiTransformer, HostKeySelector, RawFile, Session, TransformError,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MANUAL_KEY: &str = "AIzaSyExampleLongEnoughKey12345";
const ENV_KEY: &str = "env-configured-key-0123";
const FLASH_PATH: &str = "/v1beta/models/gemini-2.5-flash-image:generateContent";

fn transformer(server: &MockServer) -> GeminiTransformer {
    GeminiTransformer::builder()
        .base_url(format!("{}/v1beta", server.uri()))
        .build()
        .unwrap()
}

fn image_response(data: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "parts": [{ "inlineData": { "mimeType": "image/png", "data": data } }] },
            "finishReason": "STOP"
        }]
    })
}

fn forbidden() -> ResponseTemplate {
    ResponseTemplate::new(403).set_body_json(json!({
        "error": { "code": 403, "message": "Permission denied", "status": "PERMISSION_DENIED" }
    }))
}

async fn ready_session(server: &MockServer, holder: CredentialHolder, manual: bool) -> Session<GeminiTransformer> {
    let mut session = Session::new(transformer(server), holder);
    if manual {
        session.submit_credential(Some(MANUAL_KEY)).await.unwrap();
    } else {
        assert!(session.check_credential().await);
    }
    session.select_preset(4).unwrap();
    session
        .accept_upload(RawFile::new("me.png", "image/png", vec![1, 2, 3]))
        .await
        .unwrap();
    session
}

#[tokio::test]
async fn strips_prefix_and_wraps_result_as_png() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .and(header("x-goog-api-key", MANUAL_KEY))
        .and(body_partial_json(json!({
            "contents": [{ "parts": [
                { "text": "Prenses yap." },
                { "inlineData": { "mimeType": "image/png", "data": "AAAA" } }
            ]}],
            "generationConfig": { "imageConfig": { "aspectRatio": "1:1" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "inlineData": { "data": "BBBB" } }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let credential = Credential::new(MANUAL_KEY, CredentialOrigin::ManualEntry);
    let result = transformer(&server)
        .transform_data_uri("data:image/png;base64,AAAA", "Prenses yap.", &credential)
        .await
        .unwrap();

    assert_eq!(result.result_data_uri(), "data:image/png;base64,BBBB");
    assert_eq!(result.metadata.model.as_deref(), Some("gemini-2.5-flash-image"));
}

#[tokio::test]
async fn preview_model_skips_image_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(
            "/v1beta/models/gemini-2.0-flash-preview-image-generation:generateContent",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response("BBBB")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GeminiTransformer::builder()
        .base_url(format!("{}/v1beta", server.uri()))
        .model(GeminiModel::FlashImagePreview)
        .build()
        .unwrap();
    let credential = Credential::new(MANUAL_KEY, CredentialOrigin::ManualEntry);
    provider
        .transform_data_uri("data:image/jpeg;base64,AAAA", "x", &credential)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body["generationConfig"].get("imageConfig").is_none());
    assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/jpeg");
}

#[tokio::test]
async fn text_only_reply_is_no_image() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "I can't edit this photo." }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let credential = Credential::new(MANUAL_KEY, CredentialOrigin::ManualEntry);
    let err = transformer(&server)
        .transform_data_uri("data:image/png;base64,AAAA", "x", &credential)
        .await
        .unwrap_err();
    assert!(matches!(err, TransformError::NoImageInResponse));
}

#[tokio::test]
async fn invalid_key_body_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT",
                "details": [{
                    "@type": "type.googleapis.com/google.rpc.ErrorInfo",
                    "reason": "API_KEY_INVALID"
                }]
            }
        })))
        .mount(&server)
        .await;

    let credential = Credential::new(MANUAL_KEY, CredentialOrigin::ManualEntry);
    let err = transformer(&server)
        .transform_data_uri("AAAA", "x", &credential)
        .await
        .unwrap_err();
    match err {
        TransformError::Unauthorized { status, message } => {
            assert_eq!(status, 400);
            assert!(message.starts_with("API key not valid"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn server_error_is_not_credential_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let credential = Credential::new(MANUAL_KEY, CredentialOrigin::ManualEntry);
    let err = transformer(&server)
        .transform_data_uri("AAAA", "x", &credential)
        .await
        .unwrap_err();
    assert!(!err.is_credential_rejection());
    assert!(matches!(err, TransformError::Api { status: 500, .. }));
}

#[tokio::test]
async fn session_sends_upload_and_shows_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .and(body_partial_json(json!({
            "contents": [{ "parts": [
                { "text": "Prenses yap." },
                { "inlineData": { "mimeType": "image/png", "data": "AQID" } }
            ]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response("BBBB")))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = ready_session(&server, CredentialHolder::new(None), true).await;
    assert_eq!(session.generate().await, Some(FlowStep::ViewingResult));
    assert_eq!(
        session.result().unwrap().result_data_uri(),
        "data:image/png;base64,BBBB"
    );
}

#[tokio::test]
async fn session_no_image_returns_to_upload_with_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "no" }, {}] } }]
        })))
        .mount(&server)
        .await;

    let mut session = ready_session(&server, CredentialHolder::new(None), true).await;
    assert_eq!(session.generate().await, Some(FlowStep::AwaitingImage));
    assert!(!session.last_error().unwrap().is_empty());
}

#[tokio::test]
async fn session_regates_on_rejected_manual_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .respond_with(forbidden())
        .mount(&server)
        .await;

    let mut session = ready_session(&server, CredentialHolder::new(None), true).await;
    assert_eq!(session.generate().await, Some(FlowStep::AwaitingCredential));
    assert!(session.credential_origin().is_none());
}

struct HostKey(&'static str);

#[async_trait]
impl HostKeySelector for HostKey {
    async fn has_selected_api_key(&self) -> bool {
        true
    }

    async fn open_select_key(&self) -> Result<String, CredentialError> {
        Ok(self.0.to_string())
    }
}

#[tokio::test]
async fn session_recheck_does_not_readopt_rejected_host_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .and(header("x-goog-api-key", "rejected-host-key-123"))
        .respond_with(forbidden())
        .expect(1)
        .mount(&server)
        .await;

    let holder = CredentialHolder::with_host_selector(Arc::new(HostKey("rejected-host-key-123")));
    let mut session = ready_session(&server, holder, false).await;
    assert_eq!(session.generate().await, Some(FlowStep::AwaitingCredential));

    assert!(!session.check_credential().await);
    assert_eq!(session.step(), FlowStep::AwaitingCredential);
    assert!(session.last_error().is_some());
    assert_eq!(session.generate().await, None);
}

#[tokio::test]
async fn session_keeps_environment_key_on_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .and(header("x-goog-api-key", ENV_KEY))
        .respond_with(forbidden())
        .mount(&server)
        .await;

    let holder = CredentialHolder::new(Some(ENV_KEY.to_string()));
    let mut session = ready_session(&server, holder, false).await;
    assert_eq!(session.generate().await, Some(FlowStep::AwaitingImage));
    assert!(session.last_error().is_some());
    assert_eq!(
        session.credential_origin(),
        Some(CredentialOrigin::EnvironmentDefault)
    );
}

#[tokio::test]
async fn rapid_double_trigger_sends_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(image_response("BBBB"))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut session = ready_session(&server, CredentialHolder::new(None), true).await;
    let first = session.start_generation().expect("first trigger admitted");
    assert!(session.start_generation().is_none());
    assert!(session.start_generation().is_none());

    let outcome = first.run().await;
    assert_eq!(session.finish_generation(outcome), FlowStep::ViewingResult);
}

#[tokio::test]
async fn cancelling_abandons_slow_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(image_response("BBBB"))
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let mut session = ready_session(&server, CredentialHolder::new(None), true).await;
    let pending = session.start_generation().unwrap();
    let token = pending.cancellation_token();
    let handle = tokio::spawn(pending.run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("cancellation should finish promptly")
        .unwrap();
    assert!(matches!(outcome.result(), Err(TransformError::Cancelled)));

    assert_eq!(session.finish_generation(outcome), FlowStep::AwaitingImage);
    assert_eq!(session.last_error(), Some("generation cancelled"));
    assert!(session.can_generate());
}
