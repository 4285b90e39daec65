use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use aws_config::Region;

use crate::credentials::CredentialSource;
use crate::error::{BoxError, TokenError};
use crate::hostname::region_from_hostname;

/// Default token lifetime in seconds (15 minutes).
pub const DEFAULT_EXPIRES_IN: u64 = 900;

/// Clock returning nanoseconds since the Unix epoch.
pub type Clock = Arc<dyn Fn() -> Result<u64, BoxError> + Send + Sync>;

/// Settings for generating a DSQL auth token.
///
/// Hostname, region and credential source must all be set before a token
/// can be generated.
#[derive(Clone)]
pub struct TokenConfig {
    hostname: Option<String>,
    region: Option<Region>,
    expires_in: u64,
    credential_source: Option<Arc<dyn CredentialSource>>,
    clock: Option<Clock>,
}

impl TokenConfig {
    pub fn new() -> Self {
        Self {
            hostname: None,
            region: None,
            expires_in: DEFAULT_EXPIRES_IN,
            credential_source: None,
            clock: None,
        }
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn set_hostname(&mut self, hostname: impl Into<String>) -> &mut Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn region(&self) -> Option<&Region> {
        self.region.as_ref()
    }

    pub fn set_region(&mut self, region: Region) -> &mut Self {
        self.region = Some(region);
        self
    }

    /// Infers the region from the hostname and stores it.
    ///
    /// On a malformed hostname the configured region is left as it was.
    pub fn infer_region(&mut self) -> Result<Region, TokenError> {
        let hostname = self
            .hostname
            .as_deref()
            .ok_or_else(|| {
                TokenError::invalid_argument("hostname is required to infer the region")
            })?;
        let region = Region::new(region_from_hostname(hostname)?);
        self.region = Some(region.clone());
        Ok(region)
    }

    pub fn expires_in(&self) -> u64 {
        self.expires_in
    }

    /// Sets the token lifetime in seconds; 0 restores the default.
    pub fn set_expires_in(&mut self, expires_in: u64) -> &mut Self {
        self.expires_in = if expires_in == 0 {
            DEFAULT_EXPIRES_IN
        } else {
            expires_in
        };
        self
    }

    pub fn credential_source(&self) -> Option<&Arc<dyn CredentialSource>> {
        self.credential_source.as_ref()
    }

    /// Replaces the credential source, dropping this config's handle on the
    /// previous one.
    pub fn set_credential_source(&mut self, source: Arc<dyn CredentialSource>) -> &mut Self {
        self.credential_source = Some(source);
        self
    }

    /// Overrides the system clock. Meant for tests.
    pub fn set_clock(&mut self, clock: Clock) -> &mut Self {
        self.clock = Some(clock);
        self
    }

    /// Resets every field, releasing the credential source.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub(crate) fn now(&self) -> Result<SystemTime, TokenError> {
        let nanos = match &self.clock {
            Some(clock) => clock().map_err(|e| TokenError::ClockUnavailable(e.to_string()))?,
            None => system_time_nanos()?,
        };
        // Signing dates only need millisecond precision.
        Ok(UNIX_EPOCH + Duration::from_millis(nanos / 1_000_000))
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("hostname", &self.hostname)
            .field("region", &self.region)
            .field("expires_in", &self.expires_in)
            .field("credential_source", &self.credential_source)
            .field("clock", &self.clock.as_ref().map(|_| "custom"))
            .finish()
    }
}

fn system_time_nanos() -> Result<u64, TokenError> {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| TokenError::ClockUnavailable(e.to_string()))?;
    u64::try_from(since_epoch.as_nanos())
        .map_err(|e| TokenError::ClockUnavailable(e.to_string()))
}

/// Clock pinned to `seconds` after the Unix epoch.
pub fn fixed_clock(seconds: u64) -> Clock {
    let nanos = seconds.saturating_mul(1_000_000_000);
    Arc::new(move || Ok(nanos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentialSource;
    use crate::error::ErrorKind;
    use aws_credential_types::Credentials;

    fn source() -> Arc<dyn CredentialSource> {
        Arc::new(StaticCredentialSource::new(Credentials::new(
            "akid", "secret", None, None, "test",
        )))
    }

    #[test]
    fn defaults() {
        let config = TokenConfig::new();
        assert_eq!(config.expires_in(), DEFAULT_EXPIRES_IN);
        assert!(config.hostname().is_none());
        assert!(config.region().is_none());
        assert!(config.credential_source().is_none());
    }

    #[test]
    fn zero_expiry_means_default() {
        let mut config = TokenConfig::new();
        config.set_expires_in(450);
        assert_eq!(config.expires_in(), 450);
        config.set_expires_in(0);
        assert_eq!(config.expires_in(), DEFAULT_EXPIRES_IN);
    }

    #[test]
    fn infer_region_sets_region() {
        let mut config = TokenConfig::new();
        config.set_hostname("24abtvxzzxzrrfaxyduobmpfea.dsql.us-east-1.on.aws");
        let region = config.infer_region().unwrap();
        assert_eq!(region.as_ref(), "us-east-1");
        assert_eq!(config.region().map(|r| r.as_ref()), Some("us-east-1"));
    }

    #[test]
    fn infer_region_failure_keeps_region() {
        let mut config = TokenConfig::new();
        let err = config.infer_region().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        config
            .set_hostname("12345.dsql.us-east-1.on.aws")
            .set_region(Region::new("eu-west-1"));
        let err = config.infer_region().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(config.region().map(|r| r.as_ref()), Some("eu-west-1"));
    }

    #[test]
    fn replacing_source_releases_previous() {
        let first = source();
        let mut config = TokenConfig::new();
        config.set_credential_source(Arc::clone(&first));
        assert_eq!(Arc::strong_count(&first), 2);

        config.set_credential_source(source());
        assert_eq!(Arc::strong_count(&first), 1);

        config.set_credential_source(Arc::clone(&first));
        config.clear();
        assert_eq!(Arc::strong_count(&first), 1);
        assert_eq!(config.expires_in(), DEFAULT_EXPIRES_IN);
    }

    #[test]
    fn clock_override_truncates_to_millis() {
        let mut config = TokenConfig::new();
        config.set_clock(Arc::new(|| Ok(1_724_716_800_123_456_789)));
        let now = config.now().unwrap();
        assert_eq!(
            now.duration_since(UNIX_EPOCH).unwrap(),
            Duration::from_millis(1_724_716_800_123)
        );
    }

    #[test]
    fn failing_clock_is_reported() {
        let mut config = TokenConfig::new();
        config.set_clock(Arc::new(|| Err("clock offline".into())));
        let err = config.now().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClockUnavailable);
        assert!(err.to_string().contains("clock offline"));
    }
}
