//! Region extraction from DSQL cluster endpoints.
//!
//! Endpoints look like `<cluster-id>.dsql.<region>.on.aws` where the
//! cluster id is always 26 characters.

use crate::error::TokenError;

const DSQL_MARKER: &str = ".dsql.";
const ENDPOINT_SUFFIX: &str = ".on.aws";
const CLUSTER_ID_LEN: usize = 26;
const MIN_HOSTNAME_LEN: usize = CLUSTER_ID_LEN + DSQL_MARKER.len() + 1 + ENDPOINT_SUFFIX.len();

/// Returns the region embedded in `hostname`, or `None` when the hostname
/// does not follow the endpoint format.
pub fn parse_region(hostname: &str) -> Option<String> {
    if hostname.len() < MIN_HOSTNAME_LEN {
        return None;
    }

    // The first ".dsql." must sit right after the cluster id.
    if hostname.find(DSQL_MARKER)? != CLUSTER_ID_LEN {
        return None;
    }

    let without_suffix = hostname.strip_suffix(ENDPOINT_SUFFIX)?;
    let region = without_suffix.get(CLUSTER_ID_LEN + DSQL_MARKER.len()..)?;
    if region.is_empty() {
        return None;
    }

    Some(region.to_string())
}

/// Like [`parse_region`], but reports a malformed hostname as an error.
pub fn region_from_hostname(hostname: &str) -> Result<String, TokenError> {
    parse_region(hostname).ok_or_else(|| {
        TokenError::invalid_argument(format!(
            "hostname `{hostname}` does not match <cluster-id>.dsql.<region>.on.aws"
        ))
    })
}
