//! OAuth2 device-flow authorization and token refresh
//!
//! The device flow lets a terminal program obtain tokens without handling
//! the user's password:
//!
//! 1. [`OAuthFlow::initiate_device_flow`] asks the service for a device code,
//!    a short user code and a verification URI.
//! 2. The user opens the URI in a browser and enters the user code.
//! 3. [`OAuthFlow::await_authorization`] polls the service until the user
//!    grants or denies access, or until the caller's timeout elapses.
//! 4. A granted poll carries an authorization code, which is exchanged for a
//!    [`TokenPair`] at the token endpoint.
//!
//! Once authenticated, [`OAuthFlow::refresh`] trades the refresh token for a
//! new pair. All calls in this module are unauthenticated: the access token
//! is never attached to them.

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use crate::auth::token_store::{TokenPair, TokenStore};
use crate::client::{ApiRequest, ApiResponse, RequestState, Transport};
use crate::error::{AutolabError, Result};

/// Path that starts a device flow
pub const DEVICE_FLOW_INIT_PATH: &str = "/oauth/device_flow_init";
/// Path polled while waiting for the user
pub const DEVICE_FLOW_AUTHORIZE_PATH: &str = "/oauth/device_flow_authorize";
/// Token endpoint for both code and refresh-token grants
pub const TOKEN_PATH: &str = "/oauth/token";
/// The only non-terminal poll error
pub const AUTHORIZATION_PENDING: &str = "authorization_pending";
/// Delay between two authorization polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Application credentials registered with the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Redirect URI registered for the application
    pub redirect_uri: String,
}

/// An in-progress device authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFlowSession {
    /// Code identifying this device to the service; never shown to the user
    pub device_code: String,
    /// Code the user types at the verification URI
    pub user_code: String,
    /// Page where the user approves the device
    pub verification_uri: String,
}

/// Result of [`OAuthFlow::await_authorization`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    /// The user approved and tokens were obtained
    Granted,
    /// The service reported a terminal error, usually the user declining
    Denied(String),
    /// The timeout elapsed; the session is kept and polling may resume
    TimedOut,
}

/// What a single authorization poll said
#[derive(Debug, Clone, PartialEq, Eq)]
enum PollResult {
    Granted(String),
    Pending,
    Denied(String),
}

/// Interprets one `device_flow_authorize` response body
fn parse_poll(body: &Value) -> Result<PollResult> {
    if let Some(code) = body.get("code").and_then(Value::as_str) {
        return Ok(PollResult::Granted(code.to_string()));
    }

    match body.get("error").and_then(Value::as_str) {
        Some(AUTHORIZATION_PENDING) => Ok(PollResult::Pending),
        Some(other) => Ok(PollResult::Denied(other.to_string())),
        None => Err(AutolabError::Protocol(
            "device_flow_authorize response has neither 'code' nor 'error'".to_string(),
        )
        .into()),
    }
}

fn required_str<'a>(body: &'a Value, field: &str) -> Option<&'a str> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// Device-flow state machine and owner of the client's [`TokenPair`]
pub struct OAuthFlow {
    transport: Transport,
    credentials: OAuthCredentials,
    tokens: TokenPair,
    session: Option<DeviceFlowSession>,
    poll_interval: Duration,
    store: Box<dyn TokenStore>,
}

impl OAuthFlow {
    /// Creates an unauthenticated controller
    pub fn new(
        transport: Transport,
        credentials: OAuthCredentials,
        store: Box<dyn TokenStore>,
    ) -> Self {
        Self {
            transport,
            credentials,
            tokens: TokenPair::empty(),
            session: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            store,
        }
    }

    /// Overrides the delay between authorization polls
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Current token pair
    pub fn tokens(&self) -> &TokenPair {
        &self.tokens
    }

    /// Replaces the in-memory pair without persisting it
    pub fn set_tokens(&mut self, tokens: TokenPair) {
        self.tokens = tokens;
    }

    /// Loads the persisted pair into memory
    ///
    /// Returns `true` when a pair was found.
    pub fn load_tokens(&mut self) -> Result<bool> {
        match self.store.load_tokens()? {
            Some(tokens) => {
                self.tokens = tokens;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The active device-flow session, if any
    pub fn session(&self) -> Option<&DeviceFlowSession> {
        self.session.as_ref()
    }

    /// Abandons the active device-flow session
    pub fn cancel_device_flow(&mut self) {
        self.session = None;
    }

    /// Starts a device flow and returns the codes to show the user
    ///
    /// Replaces any previous session.
    ///
    /// # Errors
    ///
    /// Returns [`AutolabError::Protocol`] if the response lacks
    /// `device_code`, `user_code` or `verification_uri`, and
    /// [`AutolabError::Api`] if the service rejected the request.
    pub async fn initiate_device_flow(&mut self) -> Result<DeviceFlowSession> {
        let request =
            ApiRequest::get(DEVICE_FLOW_INIT_PATH).param("client_id", &self.credentials.client_id);
        let response = self.unauthenticated(&request).await?;
        let body = response.json()?;

        if !response.is_ok() {
            if let Some(message) = response.api_error() {
                return Err(AutolabError::Api {
                    status: response.status,
                    message,
                }
                .into());
            }
        }

        let session = match (
            required_str(&body, "device_code"),
            required_str(&body, "user_code"),
            required_str(&body, "verification_uri"),
        ) {
            (Some(device_code), Some(user_code), Some(verification_uri)) => DeviceFlowSession {
                device_code: device_code.to_string(),
                user_code: user_code.to_string(),
                verification_uri: verification_uri.to_string(),
            },
            _ => {
                return Err(AutolabError::Protocol(
                    "device_flow_init response is missing device_code, user_code or verification_uri"
                        .to_string(),
                )
                .into())
            }
        };

        tracing::info!("Device flow initiated");
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Polls until the user decides or `timeout` elapses
    ///
    /// Polls are spaced by the poll interval; no poll is started once the
    /// deadline, measured from the first poll, has passed.
    ///
    /// # Errors
    ///
    /// Returns [`AutolabError::InvalidState`] without touching the network
    /// when no device flow was initiated, and propagates transport or
    /// protocol failures of the polls and the code exchange.
    pub async fn await_authorization(&mut self, timeout: Duration) -> Result<AuthorizationOutcome> {
        let Some(session) = self.session.clone() else {
            return Err(AutolabError::InvalidState(
                "device flow has not been initiated".to_string(),
            )
            .into());
        };

        let request = ApiRequest::get(DEVICE_FLOW_AUTHORIZE_PATH)
            .param("client_id", &self.credentials.client_id)
            .param("device_code", &session.device_code);

        // A timeout too large to represent never expires.
        let deadline = Instant::now().checked_add(timeout);
        let mut attempt = 0u32;
        while deadline.map_or(true, |d| Instant::now() < d) {
            attempt += 1;
            let response = self.unauthenticated(&request).await?;

            match parse_poll(&response.json()?)? {
                PollResult::Granted(code) => {
                    tracing::info!(attempt, "Device authorized by user");
                    self.session = None;
                    self.exchange_authorization_code(&code).await?;
                    return Ok(AuthorizationOutcome::Granted);
                }
                PollResult::Denied(reason) => {
                    tracing::info!(attempt, %reason, "Device authorization denied");
                    self.session = None;
                    return Ok(AuthorizationOutcome::Denied(reason));
                }
                PollResult::Pending => {
                    tracing::debug!(attempt, "authorization_pending; continuing to poll");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        tracing::info!(attempt, "Timed out waiting for device authorization");
        Ok(AuthorizationOutcome::TimedOut)
    }

    /// Exchanges the refresh token for a new pair
    ///
    /// Returns `Ok(false)` when the service refused or answered without both
    /// tokens; the current pair is then left untouched.
    ///
    /// # Errors
    ///
    /// Only transport failures are returned as errors.
    pub async fn refresh(&mut self) -> Result<bool> {
        if !self.tokens.is_authenticated() {
            tracing::warn!("Cannot refresh: no refresh token available");
            return Ok(false);
        }

        let request = ApiRequest::post(TOKEN_PATH)
            .param("grant_type", "refresh_token")
            .param("client_id", &self.credentials.client_id)
            .param("client_secret", &self.credentials.client_secret)
            .param("refresh_token", self.tokens.refresh_token());

        match self.request_tokens(&request).await {
            Ok(tokens) => {
                tracing::info!("Refreshed access token");
                self.install(tokens);
                Ok(true)
            }
            Err(e) if matches!(
                e.downcast_ref::<AutolabError>(),
                Some(AutolabError::Transport(_))
            ) =>
            {
                Err(e)
            }
            Err(e) => {
                tracing::warn!("Token refresh failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn exchange_authorization_code(&mut self, code: &str) -> Result<()> {
        let request = ApiRequest::post(TOKEN_PATH)
            .param("grant_type", "authorization_code")
            .param("client_id", &self.credentials.client_id)
            .param("client_secret", &self.credentials.client_secret)
            .param("redirect_uri", &self.credentials.redirect_uri)
            .param("code", code);

        let tokens = self.request_tokens(&request).await?;
        self.install(tokens);
        Ok(())
    }

    async fn request_tokens(&self, request: &ApiRequest) -> Result<TokenPair> {
        let response = self.unauthenticated(request).await?;
        let body = response.json()?;

        match (
            required_str(&body, "access_token"),
            required_str(&body, "refresh_token"),
        ) {
            (Some(access), Some(refresh)) => TokenPair::new(access, refresh),
            _ => {
                let detail = response
                    .api_error()
                    .unwrap_or_else(|| "response lacks access_token or refresh_token".to_string());
                Err(AutolabError::Protocol(format!(
                    "token endpoint returned {}: {}",
                    response.status, detail
                ))
                .into())
            }
        }
    }

    /// Replaces the pair wholesale and persists it; persistence is best-effort
    fn install(&mut self, tokens: TokenPair) {
        self.tokens = tokens;
        if let Err(e) = self.store.store_tokens(&self.tokens) {
            tracing::warn!("Failed to persist tokens: {}", e);
        }
    }

    async fn unauthenticated(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut state = RequestState::buffered();
        self.transport.execute(request, &mut state).await?;
        state.finish().await
    }
}
