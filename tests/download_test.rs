//! Download classification tests using wiremock
//!
//! Responses carrying `Content-Disposition` are streamed into the target
//! directory; anything else is buffered and parsed as JSON.

mod common;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use autolab::client::{ApiRequest, Attachment};

use common::authenticated_client;

const HANDOUT_PATH: &str = "/api/v1/courses/15213-f16/assessments/datalab/handout";
const WRITEUP_PATH: &str = "/api/v1/courses/15213-f16/assessments/datalab/writeup";

#[tokio::test]
async fn test_attachment_is_written_under_suggested_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(HANDOUT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Disposition", r#"attachment; filename="handout.pdf""#)
                .set_body_bytes(b"%PDF-1.4 handout".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (mut client, _store) = authenticated_client(&server, "a", "r");
    let response = client
        .download_request(dir.path(), "handout", &ApiRequest::get(HANDOUT_PATH))
        .await
        .unwrap();

    let expected = dir.path().join("handout.pdf");
    assert_eq!(response.downloaded.as_deref(), Some(expected.as_path()));
    assert!(response.body.is_empty());
    assert_eq!(std::fs::read(&expected).unwrap(), b"%PDF-1.4 handout");
}

#[tokio::test]
async fn test_download_without_filename_uses_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WRITEUP_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Disposition", "attachment")
                .set_body_string("writeup text"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (mut client, _store) = authenticated_client(&server, "a", "r");
    let attachment = client
        .download_writeup(dir.path(), "15213-f16", "datalab")
        .await
        .unwrap();

    let expected = dir.path().join("writeup");
    assert_eq!(attachment, Attachment::File(expected.clone()));
    assert_eq!(std::fs::read_to_string(expected).unwrap(), "writeup text");
}

#[tokio::test]
async fn test_hosted_attachment_returns_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WRITEUP_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "url": "https://www.cs.cmu.edu/datalab.pdf" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (mut client, _store) = authenticated_client(&server, "a", "r");
    let attachment = client
        .download_writeup(dir.path(), "15213-f16", "datalab")
        .await
        .unwrap();

    assert_eq!(
        attachment,
        Attachment::Url("https://www.cs.cmu.edu/datalab.pdf".to_string())
    );
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_missing_attachment_returns_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(HANDOUT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (mut client, _store) = authenticated_client(&server, "a", "r");
    let attachment = client
        .download_handout(dir.path(), "15213-f16", "datalab")
        .await
        .unwrap();
    assert_eq!(attachment, Attachment::None);
}

#[tokio::test]
async fn test_unwritable_directory_is_file_system_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(HANDOUT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Disposition", r#"attachment; filename="h.tar""#)
                .set_body_string("data"),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("does-not-exist");
    let (mut client, _store) = authenticated_client(&server, "a", "r");
    let err = client
        .download_handout(&missing, "15213-f16", "datalab")
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<autolab::AutolabError>(),
        Some(autolab::AutolabError::FileSystem { .. })
    ));
}
