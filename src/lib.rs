//! # DSQL auth tokens
//!
//! Generates the presigned URLs that Aurora DSQL accepts as passwords.
//!
//! Modules:
//! - `config` — token settings and clock injection
//! - `hostname` — region inference from cluster endpoints
//! - `credentials` — credential sources and blocking resolution
//! - `signing` — request building and SigV4 presigning
//! - `auth` — token generation
//! - `bridge` — blocking wait on callback-style operations

pub mod auth;
pub mod bridge;
pub mod config;
pub mod credentials;
pub mod error;
pub mod hostname;
pub mod logging;
pub mod signing;

pub use crate::auth::{
    assemble_token, connection_string, generate_auth_token, generate_auth_token_with,
    get_connection_string, AuthToken, TokenGenerator,
};
pub use crate::config::{fixed_clock, Clock, TokenConfig, DEFAULT_EXPIRES_IN};
pub use crate::credentials::{CredentialSource, ProviderCredentialSource, StaticCredentialSource};
pub use crate::error::{BoxError, ErrorKind, TokenError};
pub use crate::hostname::parse_region;
pub use crate::signing::{Action, RequestSigner, SigV4Signer};
