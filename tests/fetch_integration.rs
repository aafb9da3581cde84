//! Integration tests for the document fetcher.
//!
//! Exercise `ClientSession` end to end, both against an in-process transport
//! stub and against a wiremock server through `ReqwestTransport`.

mod support;
use support::socket_guard::start_mock_server_or_skip;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use openrosa_core::{
    ClientSession, CredentialDecision, CredentialPrompt, CredentialRequest, CredentialStore,
    DenyingPrompt, HttpResponse, HttpTransport, NetworkError, PLAIN_TEXT_MIME_TYPE, ReqwestTransport,
    ServerSettings, StaticCredentialPrompt, TransportRequest,
};
use reqwest::header::HeaderMap;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, ResponseTemplate};

const FORM_LIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xforms xmlns="http://openrosa.org/xforms/xformsList">
  <xform>
    <formID>household_survey</formID>
    <name>Household Survey</name>
    <downloadUrl>http://testurl/formXml?formId=household_survey</downloadUrl>
  </xform>
</xforms>"#;

/// Transport that never produces a response.
struct NullTransport;

#[async_trait]
impl HttpTransport for NullTransport {
    async fn execute(
        &self,
        _request: TransportRequest,
    ) -> Result<Option<HttpResponse>, NetworkError> {
        Ok(None)
    }
}

/// Transport that answers every request with 401 and counts attempts.
#[derive(Default)]
struct AlwaysUnauthorized {
    attempts: AtomicUsize,
}

#[async_trait]
impl HttpTransport for AlwaysUnauthorized {
    async fn execute(
        &self,
        _request: TransportRequest,
    ) -> Result<Option<HttpResponse>, NetworkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Ok(Some(HttpResponse::new(401, HeaderMap::new(), None)))
    }
}

/// Prompt that counts how often it is asked and always supplies credentials.
#[derive(Default)]
struct CountingPrompt {
    asked: AtomicUsize,
}

#[async_trait]
impl CredentialPrompt for CountingPrompt {
    async fn request_credentials(&self, _request: &CredentialRequest) -> CredentialDecision {
        self.asked.fetch_add(1, Ordering::SeqCst);
        CredentialDecision::Provide {
            username: "alice".to_string(),
            password: "s3cret".to_string(),
        }
    }
}

#[tokio::test]
async fn test_null_response_message() {
    let session = ClientSession::new(ServerSettings::new("http://testurl"), Arc::new(NullTransport));

    let result = session.server_client().get_xml_document("http://testurl").await;

    assert_eq!(
        result.error_message(),
        Some("Parsing failed with null while accessing http://testurl")
    );
    assert!(result.document().is_none());
}

#[tokio::test]
async fn test_always_unauthorized_prompts_once_and_retries_once() {
    let transport = Arc::new(AlwaysUnauthorized::default());
    let prompt = Arc::new(CountingPrompt::default());
    let session = ClientSession::new(ServerSettings::new("http://testurl"), transport.clone())
        .with_prompt(prompt.clone());

    let result = session
        .server_client()
        .get_xml_document("http://testurl/formList")
        .await;

    assert_eq!(prompt.asked.load(Ordering::SeqCst), 1, "exactly one prompt");
    assert_eq!(
        transport.attempts.load(Ordering::SeqCst),
        2,
        "original request plus exactly one retry"
    );
    assert!(result.document().is_none());
    assert_eq!(result.response_code(), 401);
    assert_eq!(
        result.error_message(),
        Some("401 Unauthorized while accessing http://testurl/formList")
    );
}

#[test]
fn test_plain_text_mime_type_constant() {
    assert_eq!(PLAIN_TEXT_MIME_TYPE, "text/plain");
    assert_eq!(NullTransport.plain_text_mime_type(), "text/plain");
}

#[tokio::test]
async fn test_every_outcome_has_exactly_one_of_document_or_error() {
    let session = ClientSession::new(ServerSettings::new("http://testurl"), Arc::new(NullTransport));
    for url in ["http://testurl", "not-a-url", "ftp://testurl/x", ""] {
        let result = session.server_client().get_xml_document(url).await;
        assert!(
            result.document().is_some() ^ result.error_message().is_some(),
            "exactly one of document/error for {url:?}"
        );
    }
}

#[tokio::test]
async fn test_fetch_form_list_over_http() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/formList"))
        .and(header("accept", "text/xml"))
        .and(header("x-openrosa-version", "1.0"))
        .and(header_exists("date"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-OpenRosa-Version", "1.0")
                .insert_header("Content-Type", "text/xml; charset=utf-8")
                .set_body_string(FORM_LIST),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = ClientSession::new(
        ServerSettings::new(mock_server.uri()),
        Arc::new(ReqwestTransport::new()),
    );
    let url = format!("{}/formList", mock_server.uri());

    let result = session.server_client().get_xml_document(&url).await;

    assert!(result.error_message().is_none(), "{:?}", result.error_message());
    assert_eq!(result.response_code(), 200);
    assert!(result.is_open_rosa_response());
    let root = result.document().unwrap().root();
    assert_eq!(root.local_name(), "xforms");
    let form = root.child("xform").unwrap();
    assert_eq!(form.child("formID").unwrap().text(), "household_survey");
}

#[tokio::test]
async fn test_fetch_without_open_rosa_header_is_flagged() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/formList"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FORM_LIST))
        .mount(&mock_server)
        .await;

    let session = ClientSession::new(
        ServerSettings::new(mock_server.uri()),
        Arc::new(ReqwestTransport::new()),
    );
    let result = session
        .server_client()
        .get_xml_document(&format!("{}/formList", mock_server.uri()))
        .await;

    assert!(result.document().is_some());
    assert!(!result.is_open_rosa_response());
}

#[tokio::test]
async fn test_unauthorized_prompt_credentials_are_sent_on_retry() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    // "alice:s3cret"
    Mock::given(method("GET"))
        .and(path("/formList"))
        .and(header("authorization", "Basic YWxpY2U6czNjcmV0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-OpenRosa-Version", "1.0")
                .set_body_string(FORM_LIST),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/formList"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(CredentialStore::new());
    let session = ClientSession::new(
        ServerSettings::new(mock_server.uri()),
        Arc::new(ReqwestTransport::new()),
    )
    .with_credential_store(Arc::clone(&store))
    .with_prompt(Arc::new(StaticCredentialPrompt::new("alice", "s3cret")));

    let result = session
        .server_client()
        .get_xml_document(&format!("{}/formList", mock_server.uri()))
        .await;

    assert!(result.document().is_some(), "{:?}", result.error_message());
    assert_eq!(store.get(&mock_server.uri()).username, "alice");
}

#[tokio::test]
async fn test_forbidden_with_declining_prompt_is_not_retried() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/formList"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = ClientSession::new(
        ServerSettings::new(mock_server.uri()),
        Arc::new(ReqwestTransport::new()),
    )
    .with_prompt(Arc::new(DenyingPrompt));
    let url = format!("{}/formList", mock_server.uri());

    let result = session.server_client().get_xml_document(&url).await;

    assert_eq!(result.response_code(), 403);
    assert_eq!(
        result.error_message(),
        Some(format!("403 Forbidden while accessing {url}").as_str())
    );
    assert!(session.credentials().server_urls().is_empty());
}

#[tokio::test]
async fn test_server_error_status_is_reported() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).insert_header("X-OpenRosa-Version", "1.0"))
        .mount(&mock_server)
        .await;

    let session = ClientSession::new(
        ServerSettings::new(mock_server.uri()),
        Arc::new(ReqwestTransport::new()),
    );
    let url = format!("{}/formList", mock_server.uri());
    let result = session.server_client().get_xml_document(&url).await;

    assert_eq!(result.response_code(), 503);
    assert!(result.is_open_rosa_response());
    assert_eq!(
        result.error_message(),
        Some(format!("503 Service Unavailable while accessing {url}").as_str())
    );
}

#[tokio::test]
async fn test_head_probe_over_http() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("HEAD"))
        .and(path("/submission"))
        .respond_with(
            ResponseTemplate::new(204)
                .insert_header("X-OpenRosa-Version", "1.0")
                .insert_header("X-OpenRosa-Accept-Content-Length", "10485760"),
        )
        .mount(&mock_server)
        .await;

    let session = ClientSession::new(
        ServerSettings::new(mock_server.uri()),
        Arc::new(ReqwestTransport::new()),
    );
    let probe = session
        .server_client()
        .head(&format!("{}/submission", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(probe.status, 204);
    assert!(probe.is_open_rosa_response);
    assert_eq!(probe.accept_content_length, Some(10_485_760));
    assert!(probe.location.is_none());
}
