use std::time::Duration;

use wiremock::MockServer;

use autolab::auth::{MemoryTokenStore, OAuthCredentials, TokenPair};
use autolab::client::{AutolabClient, ClientOptions};

#[allow(dead_code)]
pub const AUTH_FAILED: &str = r#"{"error":"OAuth2 authorization failed"}"#;

#[allow(dead_code)]
pub fn credentials(base_uri: &str) -> OAuthCredentials {
    OAuthCredentials {
        client_id: "test-client-id".to_string(),
        client_secret: "test-client-secret".to_string(),
        redirect_uri: format!("{}/device_flow_auth_cb", base_uri),
    }
}

/// Unauthenticated client pointed at `server` with a fast poll interval
#[allow(dead_code)]
pub fn client_for(server: &MockServer) -> (AutolabClient, MemoryTokenStore) {
    client_with_store(server, MemoryTokenStore::default())
}

/// Client whose store already holds `access`/`refresh`
#[allow(dead_code)]
pub fn authenticated_client(
    server: &MockServer,
    access: &str,
    refresh: &str,
) -> (AutolabClient, MemoryTokenStore) {
    let tokens = TokenPair::new(access, refresh).expect("valid token pair");
    let (mut client, store) = client_with_store(server, MemoryTokenStore::with_tokens(tokens));
    assert!(client.load_tokens().expect("memory store loads"));
    (client, store)
}

fn client_with_store(
    server: &MockServer,
    store: MemoryTokenStore,
) -> (AutolabClient, MemoryTokenStore) {
    let options = ClientOptions::new(server.uri(), credentials(&server.uri()))
        .with_poll_interval(Duration::from_millis(10));
    let client =
        AutolabClient::new(options, Box::new(store.clone())).expect("client builds for mock server");
    (client, store)
}
