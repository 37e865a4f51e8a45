//! Plug-and-play VATSIM SSO login hook for Axum.
//!
//! Mounts one route that runs the whole OAuth 1.0a round trip with VATSIM
//! and hands the verified member to your account storage.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use vatsim_sso::middleware::{MemoryStateStore, SsoAuthConfig, sso_routes};
//!
//! // 1. Implement UserStorage and SessionEstablisher for your app
//! // 2. Configure from environment
//! let config = SsoAuthConfig::from_env()?;
//!
//! // 3. Mount the login hook at {auth_path}/login
//! let app = axum::Router::new()
//!     .merge(sso_routes(config, users, sessions, MemoryStateStore::new(), ()));
//! ```
//!
//! Handshake state lives in an [`SsoStateStore`], keyed by an encrypted
//! per-browser cookie. Use [`MemoryStateStore`] on a single node.

mod config;
mod cookies;
mod error;
mod routes;
mod state;
mod traits;

pub use config::SsoAuthConfig;
pub use error::AuthError;
pub use routes::sso_routes;
pub use traits::{MemoryStateStore, SsoStateStore};

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
