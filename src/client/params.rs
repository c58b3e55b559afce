//! Request descriptions and form parameter encoding
//!
//! [`ApiRequest`] describes one call against the service: method, path
//! relative to the base URI, ordered parameters and an optional file upload.
//! Parameter values are percent-encoded independently when the request is
//! sent; keys are emitted verbatim.

use std::path::PathBuf;

/// HTTP method used for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Parameters travel in the query string
    Get,
    /// Parameters travel in the request body
    Post,
}

/// A file sent as a multipart part alongside the form parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    /// Form field name, e.g. `submission[file]`
    pub field: String,
    /// Local file to read
    pub path: PathBuf,
}

/// Ordered key/value parameters of a request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    pairs: Vec<(String, String)>,
}

impl RequestParams {
    /// Creates an empty parameter list
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter, keeping insertion order
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Returns the value of the first parameter named `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over the parameters in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parameter names in insertion order, safe to log
    pub fn keys(&self) -> Vec<&str> {
        self.pairs.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// Returns `true` when there are no parameters
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Encodes the parameters as `key=value&key=value`
    ///
    /// # Examples
    ///
    /// ```
    /// use autolab::client::RequestParams;
    ///
    /// let mut params = RequestParams::new();
    /// params.push("client_id", "abc");
    /// params.push("q", "a&b=c d");
    /// assert_eq!(params.encode(), "client_id=abc&q=a%26b%3Dc+d");
    /// ```
    pub fn encode(&self) -> String {
        self.pairs
            .iter()
            .map(|(key, value)| format!("{}={}", key, encode_value(value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Percent-encodes a single parameter value for `x-www-form-urlencoded`
pub fn encode_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// One call against the service, relative to the configured base URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Path beginning with `/`
    pub path: String,
    /// Ordered parameters
    pub params: RequestParams,
    /// Optional multipart file part; only sent with [`HttpMethod::Post`]
    pub upload: Option<FileUpload>,
}

impl ApiRequest {
    /// Builds a GET request for `path`
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            params: RequestParams::new(),
            upload: None,
        }
    }

    /// Builds a POST request for `path`
    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            params: RequestParams::new(),
            upload: None,
        }
    }

    /// Appends a parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push(key, value);
        self
    }

    /// Attaches a file part; the request becomes a multipart POST
    pub fn upload(mut self, field: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.method = HttpMethod::Post;
        self.upload = Some(FileUpload {
            field: field.into(),
            path: path.into(),
        });
        self
    }
}
