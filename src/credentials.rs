use std::fmt;

use aws_config::SdkConfig;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, warn};

use crate::bridge::{block_on_completion, Completion};
use crate::error::{BoxError, InvalidState, TokenError};

/// Asynchronous source of AWS credentials.
///
/// `resolve` must call `on_complete` exactly once, either before returning or
/// later from any thread. An `Err` return means the request was refused
/// outright and `on_complete` will never be called.
pub trait CredentialSource: Send + Sync + fmt::Debug {
    fn resolve(&self, on_complete: Completion<Option<Credentials>>) -> Result<(), BoxError>;
}

/// Hands out a fixed set of credentials.
#[derive(Debug, Clone)]
pub struct StaticCredentialSource {
    credentials: Credentials,
}

impl StaticCredentialSource {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl CredentialSource for StaticCredentialSource {
    fn resolve(&self, on_complete: Completion<Option<Credentials>>) -> Result<(), BoxError> {
        on_complete(Ok(Some(self.credentials.clone())));
        Ok(())
    }
}

/// Drives an SDK credentials provider (for example the default chain) on a
/// tokio runtime and reports back from a runtime worker.
///
/// With a current-thread runtime, resolution is refused when called from
/// inside a runtime context. If the runtime has shut down, the spawned task is
/// dropped and resolution fails instead of waiting.
#[derive(Debug, Clone)]
pub struct ProviderCredentialSource {
    provider: SharedCredentialsProvider,
    runtime: Handle,
}

impl ProviderCredentialSource {
    pub fn new(provider: impl ProvideCredentials + 'static, runtime: Handle) -> Self {
        Self {
            provider: SharedCredentialsProvider::new(provider),
            runtime,
        }
    }

    /// Uses the credentials provider of a loaded SDK config.
    pub fn from_sdk_config(sdk_config: &SdkConfig, runtime: Handle) -> Result<Self, TokenError> {
        let provider = sdk_config.credentials_provider().ok_or_else(|| {
            TokenError::invalid_argument("SDK config has no credentials provider")
        })?;
        Ok(Self { provider, runtime })
    }
}

impl CredentialSource for ProviderCredentialSource {
    fn resolve(&self, on_complete: Completion<Option<Credentials>>) -> Result<(), BoxError> {
        // A current-thread runtime only makes progress on the thread that
        // drives it, so blocking that thread on the result never completes.
        if self.runtime.runtime_flavor() == RuntimeFlavor::CurrentThread
            && Handle::try_current().is_ok()
        {
            return Err("cannot block on a current-thread runtime from inside it; \
                 resolve from a thread outside the runtime (see TokenGenerator::generate_async)"
                .into());
        }

        let provider = self.provider.clone();
        self.runtime.spawn(async move {
            let outcome = provider
                .provide_credentials()
                .await
                .map(Some)
                .map_err(BoxError::from);
            on_complete(outcome);
        });
        Ok(())
    }
}

/// Blocks until `source` produces credentials.
///
/// A source that completes with neither credentials nor an error is treated
/// as a failure.
pub fn resolve_credentials(source: &dyn CredentialSource) -> Result<Credentials, TokenError> {
    match block_on_completion(|done| source.resolve(done)) {
        Ok(Some(credentials)) => {
            debug!(
                session_token = credentials.session_token().is_some(),
                "resolved credentials"
            );
            Ok(credentials)
        }
        Ok(None) => {
            warn!("credential source completed without credentials");
            Err(TokenError::ResolutionFailed {
                source: Box::new(InvalidState("credential source returned no credentials")),
            })
        }
        Err(source) => {
            warn!(error = %source, "credential resolution failed");
            Err(TokenError::ResolutionFailed { source })
        }
    }
}
