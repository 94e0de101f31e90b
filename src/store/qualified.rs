//! Qualified locations
//!
//! A qualified location is the fully addressable URL of an artifact's bytes:
//!
//! ```text
//! location := scheme "://" host "/" path
//! host     := 1*(any char except "/")
//! ```
//!
//! Decomposition into `(bucket, key)`:
//!
//! - plain host (`s3://my-bucket/a/b`): bucket = host, key = path
//! - cloud host name (`https://storage.host.com/real-bucket/a/b`): the host
//!   ends in a domain suffix, so bucket = first segment of path, key = rest
//!
//! `file:///abs/path` has an empty host and is not decomposable; local store
//! records always carry an explicit bucket and key instead.

use std::fmt;

use crate::{Error, Result};

/// Host suffixes that mark a multi-part cloud-storage host name.
pub const CLOUD_HOST_SUFFIXES: &[&str] = &[".com", ".net", ".org", ".io"];

/// A qualified location decomposed into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedLocation {
    scheme: String,
    host: Option<String>,
    bucket: String,
    key: String,
}

impl QualifiedLocation {
    /// URL scheme (e.g. `s3`, `gs`, `https`).
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Cloud host name, when the bucket was addressed through one.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Bucket (root namespace) holding the key.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Key within the bucket.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Consume into `(bucket, key)`.
    #[must_use]
    pub fn into_parts(self) -> (String, String) {
        (self.bucket, self.key)
    }
}

impl fmt::Display for QualifiedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Some(host) => write!(f, "{}://{host}/{}/{}", self.scheme, self.bucket, self.key),
            None => write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key),
        }
    }
}

impl std::str::FromStr for QualifiedLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

/// Build `<scheme>://<bucket>/<key>`.
#[must_use]
pub fn format(scheme: &str, bucket: &str, key: &str) -> String {
    format!("{scheme}://{bucket}/{}", key.trim_start_matches('/'))
}

/// True if `host` looks like a multi-part cloud-storage host name.
#[must_use]
pub fn is_cloud_host(host: &str) -> bool {
    CLOUD_HOST_SUFFIXES.iter().any(|suffix| host.ends_with(suffix))
}

/// Decompose a qualified location into scheme, bucket and key.
///
/// # Errors
/// [`Error::ParseError`] if the location does not match the grammar above.
pub fn parse(qualified: &str) -> Result<QualifiedLocation> {
    let (scheme, rest) = qualified
        .split_once("://")
        .ok_or_else(|| parse_error(qualified, "missing '://'"))?;

    if scheme.is_empty()
        || !scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return Err(parse_error(qualified, "invalid scheme"));
    }

    let (host, path) = rest
        .split_once('/')
        .ok_or_else(|| parse_error(qualified, "missing key"))?;
    if host.is_empty() {
        return Err(parse_error(qualified, "empty bucket"));
    }

    let (host, bucket, key) = if is_cloud_host(host) {
        let (bucket, key) = path
            .split_once('/')
            .ok_or_else(|| parse_error(qualified, "missing key after host bucket"))?;
        (Some(host.to_string()), bucket, key)
    } else {
        (None, host, path)
    };

    if bucket.is_empty() {
        return Err(parse_error(qualified, "empty bucket"));
    }
    if key.is_empty() {
        return Err(parse_error(qualified, "empty key"));
    }

    Ok(QualifiedLocation {
        scheme: scheme.to_string(),
        host,
        bucket: bucket.to_string(),
        key: key.to_string(),
    })
}

fn parse_error(qualified: &str, reason: &str) -> Error {
    Error::ParseError(format!("{qualified}: {reason}"))
}
