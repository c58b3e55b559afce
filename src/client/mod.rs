//! Authenticated access to the Autolab service
//!
//! [`AutolabClient`] is the single owned client value of a process. It
//! combines the [`Transport`], the response classifier in [`response`] and
//! the [`OAuthFlow`] controller, and applies the token policy to every
//! regular API call:
//!
//! 1. attach the current access token,
//! 2. send the request,
//! 3. if the service answers with the `"OAuth2 authorization failed"` error,
//!    refresh the tokens and retry exactly once,
//! 4. if that still fails, give up with [`AutolabError::InvalidToken`].
//!
//! Transport failures are never treated as authorization failures.

pub mod api;
pub mod params;
pub mod response;
pub mod transport;
pub mod types;

use std::path::PathBuf;
use std::time::Duration;

pub use params::{encode_value, ApiRequest, FileUpload, HttpMethod, RequestParams};
pub use response::{content_disposition_filename, ApiResponse, RequestState, AUTH_FAILED_SENTINEL};
pub use transport::Transport;
pub use types::{
    Assessment, AssessmentDetails, Attachment, Course, Problem, Submission, User,
};

use crate::auth::{
    AuthorizationOutcome, DeviceFlowSession, OAuthCredentials, OAuthFlow, TokenPair, TokenStore,
    DEFAULT_POLL_INTERVAL,
};
use crate::config::Config;
use crate::error::{AutolabError, Result};

/// How the response body of a request is handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// Buffer the body for JSON parsing
    Json,
    /// Write the body to `directory` if the response is a file download
    Download {
        /// Directory receiving the file
        directory: PathBuf,
        /// Filename used when the response does not suggest one
        default_filename: String,
    },
}

/// Settings needed to build an [`AutolabClient`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Service base URI
    pub base_uri: String,
    /// Application credentials
    pub credentials: OAuthCredentials,
    /// Delay between device-flow polls
    pub poll_interval: Duration,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ClientOptions {
    /// Options with default poll interval and timeout
    pub fn new(base_uri: impl Into<String>, credentials: OAuthCredentials) -> Self {
        Self {
            base_uri: base_uri.into(),
            credentials,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: Duration::from_secs(60),
        }
    }

    /// Options taken from a loaded [`Config`]
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_uri: config.server.base_uri.clone(),
            credentials: OAuthCredentials {
                client_id: config.server.client_id.clone(),
                client_secret: config.server.client_secret.clone(),
                redirect_uri: config.server.redirect_uri(),
            },
            poll_interval: config.auth.poll_interval(),
            timeout: config.http.timeout(),
        }
    }

    /// Overrides the device-flow poll interval
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Client for one Autolab service
///
/// # Examples
///
/// ```no_run
/// use autolab::auth::{MemoryTokenStore, OAuthCredentials};
/// use autolab::client::{AutolabClient, ClientOptions};
///
/// # async fn example() -> autolab::error::Result<()> {
/// let options = ClientOptions::new(
///     "https://autolab.example.edu",
///     OAuthCredentials {
///         client_id: "id".to_string(),
///         client_secret: "secret".to_string(),
///         redirect_uri: "https://autolab.example.edu/device_flow_auth_cb".to_string(),
///     },
/// );
/// let mut client = AutolabClient::new(options, Box::new(MemoryTokenStore::default()))?;
/// if client.load_tokens()? {
///     for course in client.get_courses().await? {
///         println!("{}", course.name);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct AutolabClient {
    transport: Transport,
    oauth: OAuthFlow,
}

impl AutolabClient {
    /// Builds an unauthenticated client
    pub fn new(options: ClientOptions, store: Box<dyn TokenStore>) -> Result<Self> {
        let transport = Transport::new(&options.base_uri, options.timeout)?;
        let oauth = OAuthFlow::new(transport.clone(), options.credentials, store)
            .with_poll_interval(options.poll_interval);
        Ok(Self { transport, oauth })
    }

    /// Loads persisted tokens; `true` when a user is set up
    pub fn load_tokens(&mut self) -> Result<bool> {
        self.oauth.load_tokens()
    }

    /// Replaces the in-memory tokens
    pub fn set_tokens(&mut self, tokens: TokenPair) {
        self.oauth.set_tokens(tokens);
    }

    /// Current tokens
    pub fn tokens(&self) -> &TokenPair {
        self.oauth.tokens()
    }

    /// The OAuth controller
    pub fn oauth(&self) -> &OAuthFlow {
        &self.oauth
    }

    /// See [`OAuthFlow::initiate_device_flow`]
    pub async fn initiate_device_flow(&mut self) -> Result<DeviceFlowSession> {
        self.oauth.initiate_device_flow().await
    }

    /// See [`OAuthFlow::await_authorization`]
    pub async fn await_authorization(&mut self, timeout: Duration) -> Result<AuthorizationOutcome> {
        self.oauth.await_authorization(timeout).await
    }

    /// See [`OAuthFlow::refresh`]
    pub async fn refresh(&mut self) -> Result<bool> {
        self.oauth.refresh().await
    }

    /// Performs an authenticated request under the refresh-and-retry policy
    ///
    /// Non-200 responses other than the authorization sentinel are returned
    /// as-is for the caller to interpret.
    ///
    /// # Errors
    ///
    /// - [`AutolabError::InvalidToken`] when the token is rejected and either
    ///   `allow_refresh` is false, the refresh fails, or the retry is
    ///   rejected again.
    /// - [`AutolabError::Transport`] and [`AutolabError::FileSystem`] as
    ///   produced by the transport and the classifier.
    pub async fn request(
        &mut self,
        kind: RequestKind,
        request: &ApiRequest,
        allow_refresh: bool,
    ) -> Result<ApiResponse> {
        let mut state = match kind {
            RequestKind::Json => RequestState::buffered(),
            RequestKind::Download {
                directory,
                default_filename,
            } => RequestState::download(directory, default_filename),
        };

        self.perform_with_refresh(&mut state, request, allow_refresh)
            .await?;
        state.finish().await
    }

    /// Authenticated JSON request with refresh enabled
    pub async fn json_request(&mut self, request: &ApiRequest) -> Result<ApiResponse> {
        self.request(RequestKind::Json, request, true).await
    }

    /// Authenticated request that may download into `directory`
    pub async fn download_request(
        &mut self,
        directory: impl Into<PathBuf>,
        default_filename: impl Into<String>,
        request: &ApiRequest,
    ) -> Result<ApiResponse> {
        let kind = RequestKind::Download {
            directory: directory.into(),
            default_filename: default_filename.into(),
        };
        self.request(kind, request, true).await
    }

    async fn perform_with_refresh(
        &mut self,
        state: &mut RequestState,
        request: &ApiRequest,
        allow_refresh: bool,
    ) -> Result<u16> {
        let status = self.attempt(state, request).await?;
        if !rejects_token(status, state) {
            return Ok(status);
        }

        if !allow_refresh {
            return Err(AutolabError::InvalidToken.into());
        }

        tracing::info!(path = %request.path, "Access token rejected, refreshing");
        if !self.oauth.refresh().await? {
            return Err(AutolabError::InvalidToken.into());
        }

        state.reset();
        let status = self.attempt(state, request).await?;
        if rejects_token(status, state) {
            return Err(AutolabError::InvalidToken.into());
        }

        tracing::debug!("Request succeeded after token refresh");
        Ok(status)
    }

    async fn attempt(&self, state: &mut RequestState, request: &ApiRequest) -> Result<u16> {
        let authorized = request
            .clone()
            .param("access_token", self.oauth.tokens().access_token());
        self.transport.execute(&authorized, state).await
    }
}

fn rejects_token(status: u16, state: &RequestState) -> bool {
    status != 200 && state.has_api_error(AUTH_FAILED_SENTINEL)
}
