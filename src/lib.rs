//! autolab - command-line client library for the Autolab autograding service
//!
//! This library provides authenticated access to an Autolab server's REST
//! API, including the OAuth2 device flow, token persistence and automatic
//! token refresh.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `auth`: Device flow, token refresh and token persistence
//! - `client`: Transport, response handling and the typed API facade
//! - `context`: `course:assessment` resolution from assessment directories
//! - `commands`: Handlers behind each CLI subcommand
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use autolab::auth::open_token_store;
//! use autolab::client::{AutolabClient, ClientOptions};
//! use autolab::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     config.validate()?;
//!
//!     let store = open_token_store(config.auth.token_store)?;
//!     let mut client = AutolabClient::new(ClientOptions::from_config(&config), store)?;
//!     if client.load_tokens()? {
//!         let user = client.get_user_info().await?;
//!         println!("Hello, {}", user.first_name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;

// Re-export commonly used types
pub use client::{AutolabClient, ClientOptions};
pub use config::Config;
pub use context::AssessmentContext;
pub use error::{AutolabError, Result};
