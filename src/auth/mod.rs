//! Authorization support
//!
//! - [`flow`]: OAuth2 device flow and token refresh
//! - [`token_store`]: token pair and its persistence

pub mod flow;
pub mod token_store;

pub use flow::{
    AuthorizationOutcome, DeviceFlowSession, OAuthCredentials, OAuthFlow, DEFAULT_POLL_INTERVAL,
};
pub use token_store::{
    open_token_store, FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenPair, TokenStore,
};
