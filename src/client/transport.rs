//! Single-request HTTP transport
//!
//! The transport turns an [`ApiRequest`] into exactly one HTTP exchange with
//! the service and feeds the response to a [`RequestState`]: headers first,
//! then the body chunk by chunk. Network failures surface as
//! [`AutolabError::Transport`] and are never retried here.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};

use crate::client::params::{ApiRequest, FileUpload, HttpMethod};
use crate::client::response::RequestState;
use crate::error::{AutolabError, Result};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// HTTP transport bound to one service base URI
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
    base_uri: String,
}

impl Transport {
    /// Creates a transport for `base_uri` with a per-request timeout
    ///
    /// # Errors
    ///
    /// Returns [`AutolabError::Transport`] if the HTTP client cannot be built.
    pub fn new(base_uri: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("autolab-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(AutolabError::Transport)?;

        Ok(Self {
            http,
            base_uri: base_uri.trim_end_matches('/').to_string(),
        })
    }

    /// Base URI without a trailing slash
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Full URL for `path`, without parameters
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_uri, path)
    }

    /// Sends `request` and returns the raw response once headers arrived
    ///
    /// # Errors
    ///
    /// Returns [`AutolabError::Transport`] when the exchange cannot complete
    /// and [`AutolabError::FileSystem`] when an upload file cannot be read.
    pub async fn send(&self, request: &ApiRequest) -> Result<reqwest::Response> {
        let mut url = self.url_for(&request.path);
        tracing::debug!(
            method = ?request.method,
            path = %request.path,
            params = ?request.params.keys(),
            "Sending request"
        );

        let builder = match (request.method, &request.upload) {
            (HttpMethod::Get, _) => {
                let encoded = request.params.encode();
                if !encoded.is_empty() {
                    url.push('?');
                    url.push_str(&encoded);
                }
                self.http.get(&url)
            }
            (HttpMethod::Post, None) => self
                .http
                .post(&url)
                .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                .body(request.params.encode()),
            (HttpMethod::Post, Some(upload)) => {
                self.http.post(&url).multipart(multipart_form(request, upload).await?)
            }
        };

        let response = builder.send().await.map_err(AutolabError::Transport)?;
        tracing::debug!(status = response.status().as_u16(), "Received response");
        Ok(response)
    }

    /// Sends `request` and streams the response into `state`
    ///
    /// Returns the HTTP status code.
    pub async fn execute(&self, request: &ApiRequest, state: &mut RequestState) -> Result<u16> {
        let response = self.send(request).await?;
        state.absorb(response).await
    }
}

async fn multipart_form(request: &ApiRequest, upload: &FileUpload) -> Result<Form> {
    let bytes = tokio::fs::read(&upload.path)
        .await
        .map_err(|e| AutolabError::file_system(&upload.path, e))?;
    let file_name = upload
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let mut form = Form::new();
    for (key, value) in request.params.iter() {
        form = form.text(key.to_string(), value.to_string());
    }
    Ok(form.part(upload.field.clone(), Part::bytes(bytes).file_name(file_name)))
}
