//! Refresh-and-retry policy integration tests using wiremock
//!
//! A request rejected with the `"OAuth2 authorization failed"` error is
//! retried exactly once after a token refresh, carrying the new access
//! token. Every other failure is handed back untouched. Downloads follow
//! the same policy as JSON requests.

mod common;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use autolab::auth::TokenStore;
use autolab::client::{ApiRequest, Attachment};
use autolab::error::{is_invalid_token, AutolabError};

use common::{authenticated_client, AUTH_FAILED};

fn user_json() -> serde_json::Value {
    json!({
        "first_name": "Ada",
        "last_name": "Lovelace",
        "email": "ada@example.edu"
    })
}

async fn mount_rejection(server: &MockServer, access_token: &str) {
    Mock::given(method("GET"))
        .and(path("/api/v1/user"))
        .and(query_param("access_token", access_token))
        .respond_with(ResponseTemplate::new(401).set_body_raw(AUTH_FAILED, "application/json"))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_rejected_token_is_refreshed_and_retried() {
    let server = MockServer::start().await;
    mount_rejection(&server, "old-access").await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/user"))
        .and(query_param("access_token", "new-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
        .expect(1)
        .mount(&server)
        .await;

    let (mut client, store) = authenticated_client(&server, "old-access", "old-refresh");
    let user = client.get_user_info().await.unwrap();

    assert_eq!(user.first_name, "Ada");
    assert_eq!(client.tokens().access_token(), "new-access");
    let stored = store.load_tokens().unwrap().unwrap();
    assert_eq!(stored.refresh_token(), "new-refresh");
}

#[tokio::test]
async fn test_rejected_download_is_refreshed_and_written_once() {
    const HANDOUT: &str = "/api/v1/courses/15213-f16/assessments/datalab/handout";

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(HANDOUT))
        .and(query_param("access_token", "old-access"))
        .respond_with(ResponseTemplate::new(401).set_body_raw(AUTH_FAILED, "application/json"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(HANDOUT))
        .and(query_param("access_token", "new-access"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Disposition", r#"attachment; filename="h.tar""#)
                .set_body_bytes(b"TAR".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (mut client, _store) = authenticated_client(&server, "old-access", "old-refresh");
    let attachment = client
        .download_handout(dir.path(), "15213-f16", "datalab")
        .await
        .unwrap();

    let expected = dir.path().join("h.tar");
    assert_eq!(attachment, Attachment::File(expected.clone()));
    assert_eq!(std::fs::read(&expected).unwrap(), b"TAR");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    assert_eq!(client.tokens().access_token(), "new-access");
}

#[tokio::test]
async fn test_second_rejection_gives_invalid_token_after_one_refresh() {
    let server = MockServer::start().await;
    mount_rejection(&server, "old-access").await;
    mount_rejection(&server, "new-access").await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (mut client, _store) = authenticated_client(&server, "old-access", "old-refresh");
    let err = client.get_user_info().await.unwrap_err();
    assert!(is_invalid_token(&err));
}

#[tokio::test]
async fn test_failed_refresh_leaves_tokens_unchanged() {
    let server = MockServer::start().await;
    mount_rejection(&server, "old-access").await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (mut client, store) = authenticated_client(&server, "old-access", "old-refresh");
    let err = client.get_user_info().await.unwrap_err();

    assert!(is_invalid_token(&err));
    assert_eq!(client.tokens().access_token(), "old-access");
    assert_eq!(client.tokens().refresh_token(), "old-refresh");
    let stored = store.load_tokens().unwrap().unwrap();
    assert_eq!(stored.access_token(), "old-access");
}

#[tokio::test]
async fn test_refresh_disabled_fails_without_refreshing() {
    let server = MockServer::start().await;
    mount_rejection(&server, "old-access").await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let (mut client, _store) = authenticated_client(&server, "old-access", "old-refresh");
    let request = ApiRequest::get("/api/v1/user");
    let err = client
        .request(autolab::client::RequestKind::Json, &request, false)
        .await
        .unwrap_err();
    assert!(is_invalid_token(&err));
}

#[tokio::test]
async fn test_other_errors_pass_through_without_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/courses/nope/assessments"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "error": "Course not found" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let (mut client, _store) = authenticated_client(&server, "a", "r");
    let err = client.get_assessments("nope").await.unwrap_err();
    match err.downcast_ref::<AutolabError>() {
        Some(AutolabError::Api { status, message }) => {
            assert_eq!(*status, 404);
            assert_eq!(message, "Course not found");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_raw_request_returns_non_200_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/courses"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;

    let (mut client, _store) = authenticated_client(&server, "a", "r");
    let response = client
        .json_request(&ApiRequest::get("/api/v1/courses"))
        .await
        .unwrap();
    assert_eq!(response.status, 503);
    assert_eq!(response.body, b"maintenance");
}
