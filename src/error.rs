use std::error::Error;
use std::fmt;

/// Boxed error carried across the credential and signing callbacks.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Errors produced while generating an auth token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Missing hostname, region or credential source, or a hostname that
    /// does not follow the DSQL endpoint format.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The credential source reported an error or returned no credentials.
    #[error("failed to resolve credentials: {source}")]
    ResolutionFailed {
        #[source]
        source: BoxError,
    },

    /// The signer rejected the request.
    #[error("failed to sign request: {source}")]
    SigningFailed {
        #[source]
        source: BoxError,
    },

    /// The configured clock could not produce the current time.
    #[error("clock unavailable: {0}")]
    ClockUnavailable(String),

    /// A string or buffer could not be built.
    #[error("allocation failed: {0}")]
    AllocationFailed(String),
}

/// Category of a [`TokenError`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    ResolutionFailed,
    SigningFailed,
    ClockUnavailable,
    AllocationFailed,
}

impl TokenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TokenError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            TokenError::ResolutionFailed { .. } => ErrorKind::ResolutionFailed,
            TokenError::SigningFailed { .. } => ErrorKind::SigningFailed,
            TokenError::ClockUnavailable(_) => ErrorKind::ClockUnavailable,
            TokenError::AllocationFailed(_) => ErrorKind::AllocationFailed,
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        TokenError::InvalidArgument(message.into())
    }
}

/// Stand-in cause when a completion reports neither a value nor an error.
#[derive(Debug, Clone, Copy)]
pub struct InvalidState(pub &'static str);

impl fmt::Display for InvalidState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid state: {}", self.0)
    }
}

impl Error for InvalidState {}
