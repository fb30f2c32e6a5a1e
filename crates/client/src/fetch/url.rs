//! Building absolute API URLs from the configured origin.
//!
//! Store keys are computed from the absolute URL string, so every URL that
//! reaches the layer is normalized the same way: lowercase host, no
//! fragment, query string kept as given.

/// Error type for URL building failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("path must start with '/': {0}")]
    RelativePath(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("path resolves outside the API origin: {0}")]
    ForeignOrigin(String),
}

impl From<UrlError> for anacache_core::Error {
    fn from(err: UrlError) -> Self {
        anacache_core::Error::InvalidUrl(err.to_string())
    }
}

/// Parse and normalize an API origin.
///
/// 1. Trim leading/trailing whitespace
/// 2. Require http or https
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = url::Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str().map(str::to_lowercase) {
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Resolve an absolute path (with optional query) against the API origin.
///
/// Any path on `base` is replaced; the analytics API is addressed from the
/// origin root. The result must keep the scheme, host and port of `base`.
pub fn api_url(base: &str, path_and_query: &str) -> Result<url::Url, UrlError> {
    let path_and_query = path_and_query.trim();
    if !path_and_query.starts_with('/') {
        return Err(UrlError::RelativePath(path_and_query.to_string()));
    }

    let base = canonicalize(base)?;
    let mut joined = base
        .join(path_and_query)
        .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    joined.set_fragment(None);

    if joined.origin() != base.origin() {
        return Err(UrlError::ForeignOrigin(path_and_query.to_string()));
    }

    Ok(joined)
}
