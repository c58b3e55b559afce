//! Response classification and per-request state
//!
//! Every response is inspected once, before any body bytes are read. When
//! the caller asked for a download (by supplying a target directory) and the
//! response carries a `Content-Disposition` header, the body is streamed
//! into `target_directory/filename`; otherwise it is buffered in memory and
//! interpreted as JSON by the caller.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION};
use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::{AutolabError, Result};

/// Error string the service returns when it rejects an access token
pub const AUTH_FAILED_SENTINEL: &str = "OAuth2 authorization failed";

/// Extracts the first `filename="..."` value from a `Content-Disposition`
///
/// Only the final path component is kept so a hostile header cannot write
/// outside the target directory.
///
/// # Examples
///
/// ```
/// use autolab::client::content_disposition_filename;
///
/// let header = r#"attachment; filename="handout.pdf""#;
/// assert_eq!(content_disposition_filename(header), Some("handout.pdf".to_string()));
/// assert_eq!(content_disposition_filename("attachment"), None);
/// ```
pub fn content_disposition_filename(header: &str) -> Option<String> {
    static FILENAME: OnceLock<Regex> = OnceLock::new();
    let re = FILENAME.get_or_init(|| {
        Regex::new(r#"filename="([^"]*)""#).expect("filename pattern is a valid regex")
    });

    let raw = re.captures(header)?.get(1)?.as_str();
    let name = Path::new(raw).file_name()?.to_str()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

struct DownloadSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

/// Transient record of one logical request
///
/// Built immediately before a transport call, filled while the response
/// streams in, and reused once on a refresh-retry after [`reset`](Self::reset).
pub struct RequestState {
    target_directory: Option<PathBuf>,
    suggested_filename: String,
    is_download: bool,
    body: Vec<u8>,
    sink: Option<DownloadSink>,
    status: u16,
}

impl RequestState {
    /// State for a request whose body is always buffered
    pub fn buffered() -> Self {
        Self {
            target_directory: None,
            suggested_filename: String::new(),
            is_download: false,
            body: Vec::new(),
            sink: None,
            status: 0,
        }
    }

    /// State for a request that may turn into a download into `directory`
    ///
    /// `default_filename` is used when the response does not name the file.
    pub fn download(directory: impl Into<PathBuf>, default_filename: impl Into<String>) -> Self {
        Self {
            target_directory: Some(directory.into()),
            suggested_filename: default_filename.into(),
            ..Self::buffered()
        }
    }

    /// Whether header inspection may switch this request to a download
    pub fn considers_download(&self) -> bool {
        self.target_directory.is_some()
    }

    /// Whether the response was classified as a file download
    pub fn is_download(&self) -> bool {
        self.is_download
    }

    /// Filename the download is (or would be) written to
    pub fn suggested_filename(&self) -> &str {
        &self.suggested_filename
    }

    /// Buffered body bytes; always empty for downloads
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// HTTP status of the last absorbed response
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Decides download vs buffered from the response headers
    ///
    /// # Errors
    ///
    /// Returns [`AutolabError::FileSystem`] if the output file cannot be
    /// created.
    pub async fn inspect_headers(&mut self, headers: &HeaderMap) -> Result<()> {
        if self.is_download {
            return Ok(());
        }
        let Some(directory) = self.target_directory.clone() else {
            return Ok(());
        };
        let Some(disposition) = headers.get(CONTENT_DISPOSITION) else {
            return Ok(());
        };

        let disposition = String::from_utf8_lossy(disposition.as_bytes());
        tracing::debug!(header = %disposition, "Response is a file download");
        self.is_download = true;
        if let Some(name) = content_disposition_filename(&disposition) {
            self.suggested_filename = name;
        }

        let path = directory.join(&self.suggested_filename);
        let file = File::create(&path)
            .await
            .map_err(|e| AutolabError::file_system(&path, e))?;
        tracing::debug!(path = %path.display(), "Opened download file");
        self.sink = Some(DownloadSink {
            path,
            writer: BufWriter::new(file),
        });
        Ok(())
    }

    /// Routes one body chunk to the file sink or the in-memory buffer
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        match self.sink.as_mut() {
            Some(sink) => sink
                .writer
                .write_all(chunk)
                .await
                .map_err(|e| AutolabError::file_system(&sink.path, e).into()),
            None => {
                self.body.extend_from_slice(chunk);
                Ok(())
            }
        }
    }

    /// Consumes a response: status, then headers, then every body chunk
    pub async fn absorb(&mut self, mut response: reqwest::Response) -> Result<u16> {
        self.status = response.status().as_u16();
        self.inspect_headers(response.headers()).await?;

        while let Some(chunk) = response.chunk().await.map_err(AutolabError::Transport)? {
            self.write_chunk(&chunk).await?;
        }

        if let Some(sink) = self.sink.as_mut() {
            sink.writer
                .flush()
                .await
                .map_err(|e| AutolabError::file_system(&sink.path, e))?;
        }
        Ok(self.status)
    }

    /// Clears the buffered body before a retry; a file sink is kept
    pub fn reset(&mut self) {
        self.body.clear();
    }

    /// Returns `true` if the buffered body is `{"error": <message>}`
    pub fn has_api_error(&self, message: &str) -> bool {
        if self.is_download {
            return false;
        }
        serde_json::from_slice::<Value>(&self.body)
            .ok()
            .and_then(|v| v.get("error").and_then(Value::as_str).map(|e| e == message))
            .unwrap_or(false)
    }

    /// Closes any file sink and returns the outcome of the request
    pub async fn finish(mut self) -> Result<ApiResponse> {
        let downloaded = match self.sink.take() {
            Some(mut sink) => {
                sink.writer
                    .flush()
                    .await
                    .map_err(|e| AutolabError::file_system(&sink.path, e))?;
                Some(sink.path)
            }
            None => None,
        };

        Ok(ApiResponse {
            status: self.status,
            body: self.body,
            downloaded,
        })
    }
}

/// Outcome of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Buffered body; empty when the response was downloaded
    pub body: Vec<u8>,
    /// Where the body was written, for downloads
    pub downloaded: Option<PathBuf>,
}

impl ApiResponse {
    /// `true` for HTTP 200
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Parses the buffered body as JSON; an empty body is `null`
    ///
    /// # Errors
    ///
    /// Returns [`AutolabError::Protocol`] if the body is not valid JSON.
    pub fn json(&self) -> Result<Value> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&self.body).map_err(|e| {
            AutolabError::Protocol(format!(
                "expected a JSON body (HTTP {}): {}",
                self.status, e
            ))
            .into()
        })
    }

    /// Value of a top-level `error` string, if the body carries one
    pub fn api_error(&self) -> Option<String> {
        serde_json::from_slice::<Value>(&self.body)
            .ok()?
            .get("error")?
            .as_str()
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use tempfile::TempDir;

    fn disposition(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_DISPOSITION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_filename_first_occurrence_wins() {
        let header = r#"attachment; filename="a.txt"; filename="b.txt""#;
        assert_eq!(content_disposition_filename(header), Some("a.txt".into()));
    }

    #[test]
    fn test_filename_malformed_is_none() {
        assert_eq!(content_disposition_filename("attachment; filename=a.txt"), None);
        assert_eq!(content_disposition_filename(r#"attachment; filename="""#), None);
        assert_eq!(content_disposition_filename(r#"attachment; filename="open"#), None);
    }

    #[test]
    fn test_filename_strips_directories() {
        let header = r#"attachment; filename="../../etc/passwd""#;
        assert_eq!(content_disposition_filename(header), Some("passwd".into()));
    }

    #[tokio::test]
    async fn test_buffered_state_ignores_content_disposition() {
        let mut state = RequestState::buffered();
        state
            .inspect_headers(&disposition(r#"attachment; filename="x.pdf""#))
            .await
            .unwrap();
        assert!(!state.is_download());
        state.write_chunk(b"{}").await.unwrap();
        assert_eq!(state.body(), b"{}");
    }

    #[tokio::test]
    async fn test_download_state_writes_to_file_not_buffer() {
        let dir = TempDir::new().unwrap();
        let mut state = RequestState::download(dir.path(), "handout");
        state
            .inspect_headers(&disposition(r#"attachment; filename="handout.pdf""#))
            .await
            .unwrap();
        assert!(state.is_download());
        state.write_chunk(b"%PDF-").await.unwrap();
        state.write_chunk(b"1.4").await.unwrap();
        assert!(state.body().is_empty());

        let response = state.finish().await.unwrap();
        let path = dir.path().join("handout.pdf");
        assert_eq!(response.downloaded.as_deref(), Some(path.as_path()));
        assert!(response.body.is_empty());
        assert_eq!(std::fs::read(path).unwrap(), b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_download_without_filename_uses_default() {
        let dir = TempDir::new().unwrap();
        let mut state = RequestState::download(dir.path(), "writeup");
        state.inspect_headers(&disposition("attachment")).await.unwrap();
        assert_eq!(state.suggested_filename(), "writeup");
        assert!(state.finish().await.unwrap().downloaded.unwrap().ends_with("writeup"));
    }

    #[tokio::test]
    async fn test_download_truncates_existing_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("h.txt"), "old contents that are long").unwrap();
        let mut state = RequestState::download(dir.path(), "h");
        state
            .inspect_headers(&disposition(r#"attachment; filename="h.txt""#))
            .await
            .unwrap();
        state.write_chunk(b"new").await.unwrap();
        state.finish().await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("h.txt")).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_unwritable_directory_is_file_system_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");
        let mut state = RequestState::download(missing, "h");
        let err = state
            .inspect_headers(&disposition(r#"attachment; filename="h.txt""#))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AutolabError>(),
            Some(AutolabError::FileSystem { .. })
        ));
    }

    #[tokio::test]
    async fn test_is_download_never_unset_by_reset() {
        let dir = TempDir::new().unwrap();
        let mut state = RequestState::download(dir.path(), "h");
        state
            .inspect_headers(&disposition(r#"attachment; filename="h.txt""#))
            .await
            .unwrap();
        state.reset();
        state.inspect_headers(&HeaderMap::new()).await.unwrap();
        assert!(state.is_download());
    }

    #[tokio::test]
    async fn test_has_api_error_matches_sentinel_only() {
        let mut state = RequestState::buffered();
        state
            .write_chunk(br#"{"error":"OAuth2 authorization failed"}"#)
            .await
            .unwrap();
        assert!(state.has_api_error(AUTH_FAILED_SENTINEL));
        assert!(!state.has_api_error("something else"));

        state.reset();
        state.write_chunk(br#"{"error":"Assessment not found"}"#).await.unwrap();
        assert!(!state.has_api_error(AUTH_FAILED_SENTINEL));

        state.reset();
        state.write_chunk(b"not json").await.unwrap();
        assert!(!state.has_api_error(AUTH_FAILED_SENTINEL));
    }

    #[test]
    fn test_api_response_json_and_error() {
        let response = ApiResponse {
            status: 404,
            body: br#"{"error":"Course not found"}"#.to_vec(),
            downloaded: None,
        };
        assert!(!response.is_ok());
        assert_eq!(response.api_error().as_deref(), Some("Course not found"));
        assert_eq!(response.json().unwrap()["error"], "Course not found");
    }

    #[test]
    fn test_api_response_empty_body_is_null() {
        let response = ApiResponse {
            status: 200,
            body: Vec::new(),
            downloaded: None,
        };
        assert_eq!(response.json().unwrap(), Value::Null);
    }

    #[test]
    fn test_api_response_invalid_json_is_protocol_error() {
        let response = ApiResponse {
            status: 200,
            body: b"<html>".to_vec(),
            downloaded: None,
        };
        let err = response.json().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AutolabError>(),
            Some(AutolabError::Protocol(_))
        ));
    }
}
