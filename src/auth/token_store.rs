//! Access/refresh token persistence
//!
//! Tokens obtained from the service are kept in a [`TokenPair`] and
//! persisted through a [`TokenStore`]. Three stores are provided:
//!
//! - [`KeyringTokenStore`]: the operating system's native credential store
//!   (Keychain on macOS, Secret Service on Linux, Credential Manager on
//!   Windows). This is the default.
//! - [`FileTokenStore`]: a JSON file in the user's data directory, for
//!   machines without a usable keyring.
//! - [`MemoryTokenStore`]: in-process only.
//!
//! Every store serializes the pair to JSON and validates it on load, so a
//! half-written entry is reported instead of producing a partial pair.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::config::TokenStoreKind;
use crate::error::{AutolabError, Result};

// ---------------------------------------------------------------------------
// TokenPair
// ---------------------------------------------------------------------------

/// Access and refresh token issued by the service
///
/// A pair is either fully empty (unauthenticated) or carries both tokens;
/// [`TokenPair::new`] refuses anything in between.
///
/// # Examples
///
/// ```
/// use autolab::auth::TokenPair;
///
/// let pair = TokenPair::new("access", "refresh").unwrap();
/// assert!(pair.is_authenticated());
///
/// assert!(TokenPair::new("access", "").is_err());
/// assert!(!TokenPair::empty().is_authenticated());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    access_token: String,
    refresh_token: String,
}

impl TokenPair {
    /// Builds a pair, rejecting a partially filled one
    ///
    /// # Errors
    ///
    /// Returns [`AutolabError::Protocol`] when exactly one token is empty.
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Result<Self> {
        let access_token = access_token.into();
        let refresh_token = refresh_token.into();
        if access_token.is_empty() != refresh_token.is_empty() {
            return Err(AutolabError::Protocol(
                "a token pair needs both an access token and a refresh token".to_string(),
            )
            .into());
        }
        Ok(Self {
            access_token,
            refresh_token,
        })
    }

    /// The unauthenticated pair
    pub fn empty() -> Self {
        Self::default()
    }

    /// `true` when both tokens are present
    pub fn is_authenticated(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Current access token; empty when unauthenticated
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Current refresh token; empty when unauthenticated
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }
}

#[derive(Deserialize)]
struct StoredTokens {
    access_token: String,
    refresh_token: String,
}

fn decode(json_str: &str) -> Result<Option<TokenPair>> {
    let stored: StoredTokens = serde_json::from_str(json_str)?;
    let pair = TokenPair::new(stored.access_token, stored.refresh_token)?;
    Ok(pair.is_authenticated().then_some(pair))
}

// ---------------------------------------------------------------------------
// TokenStore
// ---------------------------------------------------------------------------

/// Persistence for the client's token pair
pub trait TokenStore: Send + Sync {
    /// Loads the saved pair; `Ok(None)` when nothing is stored
    fn load_tokens(&self) -> Result<Option<TokenPair>>;

    /// Saves `tokens`, replacing any previous pair
    fn store_tokens(&self, tokens: &TokenPair) -> Result<()>;

    /// Removes the saved pair; a no-op when nothing is stored
    fn clear_tokens(&self) -> Result<()>;
}

/// Opens the store selected in the configuration
pub fn open_token_store(kind: TokenStoreKind) -> Result<Box<dyn TokenStore>> {
    match kind {
        TokenStoreKind::Keyring => Ok(Box::new(KeyringTokenStore::default())),
        TokenStoreKind::File => {
            let store = FileTokenStore::in_data_dir()?;
            tracing::debug!(path = %store.path().display(), "Using file token store");
            Ok(Box::new(store))
        }
    }
}

// ---------------------------------------------------------------------------
// KeyringTokenStore
// ---------------------------------------------------------------------------

/// Token store backed by the OS native keyring
///
/// # Examples
///
/// ```no_run
/// use autolab::auth::{KeyringTokenStore, TokenPair, TokenStore};
///
/// let store = KeyringTokenStore::default();
/// store.store_tokens(&TokenPair::new("a", "r").unwrap()).unwrap();
/// assert!(store.load_tokens().unwrap().is_some());
/// ```
#[derive(Debug, Clone)]
pub struct KeyringTokenStore {
    service: String,
    user: String,
}

impl KeyringTokenStore {
    /// Store under an explicit keyring service and user name
    pub fn new(service: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            user: user.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, &self.user).map_err(|e| AutolabError::Keyring(e).into())
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new("autolab", "default")
    }
}

impl TokenStore for KeyringTokenStore {
    fn load_tokens(&self) -> Result<Option<TokenPair>> {
        match self.entry()?.get_password() {
            Ok(json_str) if json_str.is_empty() => Ok(None),
            Ok(json_str) => decode(&json_str),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AutolabError::Keyring(e).into()),
        }
    }

    fn store_tokens(&self, tokens: &TokenPair) -> Result<()> {
        let json_str = serde_json::to_string(tokens)?;
        self.entry()?
            .set_password(&json_str)
            .map_err(AutolabError::Keyring)?;
        tracing::debug!(service = %self.service, "Stored tokens in keyring");
        Ok(())
    }

    fn clear_tokens(&self) -> Result<()> {
        match self.entry()?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AutolabError::Keyring(e).into()),
        }
    }
}

// ---------------------------------------------------------------------------
// FileTokenStore
// ---------------------------------------------------------------------------

/// Token store backed by a JSON file
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Store at an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `tokens.json` in the platform data directory
    ///
    /// # Errors
    ///
    /// Returns [`AutolabError::Config`] if no home directory can be found.
    pub fn in_data_dir() -> Result<Self> {
        let dirs = ProjectDirs::from("edu", "autolab", "autolab").ok_or_else(|| {
            AutolabError::Config("Could not determine data directory".to_string())
        })?;
        Ok(Self::new(dirs.data_dir().join("tokens.json")))
    }

    /// Location of the token file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load_tokens(&self) -> Result<Option<TokenPair>> {
        match std::fs::read_to_string(&self.path) {
            Ok(json_str) => decode(&json_str),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AutolabError::file_system(&self.path, e).into()),
        }
    }

    fn store_tokens(&self, tokens: &TokenPair) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AutolabError::file_system(parent, e))?;
        }
        let json_str = serde_json::to_string(tokens)?;
        std::fs::write(&self.path, json_str)
            .map_err(|e| AutolabError::file_system(&self.path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| AutolabError::file_system(&self.path, e))?;
        }

        tracing::debug!(path = %self.path.display(), "Stored tokens in file");
        Ok(())
    }

    fn clear_tokens(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AutolabError::file_system(&self.path, e).into()),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryTokenStore
// ---------------------------------------------------------------------------

/// In-process token store
///
/// Clones share the same slot, so a clone kept by the caller observes what
/// the client stored.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    slot: Arc<Mutex<Option<TokenPair>>>,
}

impl MemoryTokenStore {
    /// Store pre-filled with `tokens`
    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(tokens))),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<TokenPair>>> {
        self.slot
            .lock()
            .map_err(|_| AutolabError::InvalidState("token store lock poisoned".to_string()).into())
    }
}

impl TokenStore for MemoryTokenStore {
    fn load_tokens(&self) -> Result<Option<TokenPair>> {
        Ok(self.lock()?.clone())
    }

    fn store_tokens(&self, tokens: &TokenPair) -> Result<()> {
        *self.lock()? = Some(tokens.clone());
        Ok(())
    }

    fn clear_tokens(&self) -> Result<()> {
        *self.lock()? = None;
        Ok(())
    }
}
