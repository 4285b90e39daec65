//! Request building and SigV4 presigning.

use std::fmt;
use std::time::{Duration, SystemTime};

use aws_config::Region;
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    self, PercentEncodingMode, SignableBody, SignableRequest, SignatureLocation, SigningSettings,
    UriPathNormalizationMode,
};
use aws_sigv4::sign::v4::SigningParams;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{debug, warn};

use crate::bridge::{block_on_completion, Completion};
use crate::error::{BoxError, TokenError};

/// Signing name of Aurora DSQL.
pub const SERVICE_NAME: &str = "dsql";

/// SigV4 unreserved characters stay as-is, everything else is escaped.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Connection intent encoded in the `Action` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    DbConnect,
    DbConnectAdmin,
}

impl Action {
    pub fn for_admin(admin: bool) -> Self {
        if admin {
            Action::DbConnectAdmin
        } else {
            Action::DbConnect
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::DbConnect => "DbConnect",
            Action::DbConnectAdmin => "DbConnectAdmin",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The GET request that gets presigned into a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    method: String,
    path_and_query: String,
    headers: Vec<(String, String)>,
}

impl TokenRequest {
    pub fn new(hostname: &str, action: Action) -> Self {
        Self {
            method: "GET".to_string(),
            path_and_query: format!("/?Action={action}"),
            headers: vec![("Host".to_string(), hostname.to_string())],
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path_and_query(&self) -> &str {
        &self.path_and_query
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn host(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("host"))
            .map(|(_, value)| value.as_str())
    }

    /// Applies signer output in the order the signer produced it.
    pub fn apply(&mut self, output: &SigningOutput) {
        for (name, value) in &output.query_params {
            let separator = if self.path_and_query.contains('?') { '&' } else { '?' };
            self.path_and_query.push(separator);
            self.path_and_query
                .extend(utf8_percent_encode(name, QUERY_VALUE));
            self.path_and_query.push('=');
            self.path_and_query
                .extend(utf8_percent_encode(value, QUERY_VALUE));
        }
        self.headers.extend(output.headers.iter().cloned());
    }
}

/// Everything a signer needs besides the request itself.
///
/// Always SigV4 with the signature placed in the query string.
#[derive(Debug, Clone)]
pub struct SigningConfig {
    pub service: String,
    pub region: Region,
    pub credentials: Credentials,
    pub expires_in: u64,
    pub time: SystemTime,
    pub double_uri_encode: bool,
    pub normalize_uri_path: bool,
}

impl SigningConfig {
    /// Query-string presigning for DSQL.
    pub fn presign(
        region: Region,
        credentials: Credentials,
        expires_in: u64,
        time: SystemTime,
    ) -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
            region,
            credentials,
            expires_in,
            time,
            double_uri_encode: false,
            normalize_uri_path: true,
        }
    }
}

/// Signature material produced by a signer, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningOutput {
    pub query_params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

/// Asynchronous request signer.
///
/// Same completion contract as [`crate::credentials::CredentialSource`]:
/// exactly one call to `on_complete` unless `sign_async` itself fails.
pub trait RequestSigner: Send + Sync + fmt::Debug {
    fn sign_async(
        &self,
        request: &TokenRequest,
        config: &SigningConfig,
        on_complete: Completion<SigningOutput>,
    ) -> Result<(), BoxError>;
}

/// SigV4 signer backed by `aws-sigv4`. Completes before returning.
#[derive(Debug, Clone, Copy, Default)]
pub struct SigV4Signer;

impl RequestSigner for SigV4Signer {
    fn sign_async(
        &self,
        request: &TokenRequest,
        config: &SigningConfig,
        on_complete: Completion<SigningOutput>,
    ) -> Result<(), BoxError> {
        on_complete(sign_v4(request, config));
        Ok(())
    }
}

fn sign_v4(request: &TokenRequest, config: &SigningConfig) -> Result<SigningOutput, BoxError> {
    let mut settings = SigningSettings::default();
    settings.signature_location = SignatureLocation::QueryParams;
    settings.expires_in = Some(Duration::from_secs(config.expires_in));
    settings.percent_encoding_mode = if config.double_uri_encode {
        PercentEncodingMode::Double
    } else {
        PercentEncodingMode::Single
    };
    settings.uri_path_normalization_mode = if config.normalize_uri_path {
        UriPathNormalizationMode::Enabled
    } else {
        UriPathNormalizationMode::Disabled
    };

    let identity = config.credentials.clone().into();
    let params = SigningParams::builder()
        .identity(&identity)
        .region(config.region.as_ref())
        .name(&config.service)
        .time(config.time)
        .settings(settings)
        .build()?;

    let host = request.host().ok_or("request has no Host header")?;
    let uri = format!("https://{host}{}", request.path_and_query());
    let signable = SignableRequest::new(
        request.method(),
        &uri,
        request
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str())),
        SignableBody::Bytes(&[]),
    )?;

    let (instructions, _signature) = http_request::sign(signable, &params.into())?.into_parts();

    let mut output = SigningOutput::default();
    for (name, value) in instructions.params() {
        output.query_params.push((name.to_string(), value.to_string()));
    }
    // Stable, so parameters outside PARAM_ORDER keep their relative order.
    output.query_params.sort_by_key(|(name, _)| param_rank(name));
    for (name, value) in instructions.headers() {
        output.headers.push((name.to_string(), value.to_string()));
    }
    Ok(output)
}

/// Emission order of the presigning parameters; `X-Amz-Signature` always
/// comes last.
const PARAM_ORDER: [&str; 6] = [
    "X-Amz-Algorithm",
    "X-Amz-Credential",
    "X-Amz-Date",
    "X-Amz-SignedHeaders",
    "X-Amz-Expires",
    "X-Amz-Security-Token",
];

fn param_rank(name: &str) -> usize {
    if name == "X-Amz-Signature" {
        return PARAM_ORDER.len() + 1;
    }
    PARAM_ORDER
        .iter()
        .position(|known| *known == name)
        .unwrap_or(PARAM_ORDER.len())
}

/// Builds the request for `action` and presigns it, blocking until the
/// signer completes.
pub fn sign(
    signer: &dyn RequestSigner,
    hostname: &str,
    action: Action,
    config: &SigningConfig,
) -> Result<TokenRequest, TokenError> {
    let mut request = TokenRequest::new(hostname, action);

    let output = block_on_completion(|done| signer.sign_async(&request, config, done))
        .map_err(|source| {
            warn!(error = %source, %action, "signing failed");
            TokenError::SigningFailed { source }
        })?;

    request.apply(&output);
    debug!(
        %action,
        region = %config.region,
        params = output.query_params.len(),
        "signed request"
    );
    Ok(request)
}
