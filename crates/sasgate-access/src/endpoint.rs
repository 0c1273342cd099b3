//! Where callbacks land: public origin plus callback path.
//!
//! The issuer and the authorizer must agree byte-for-byte on the URL that
//! gets signed, so both build it through this one type.

use url::Url;

use crate::error::{SetupError, SetupResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackEndpoint {
    origin: String,
    callback_path: String,
}

impl CallbackEndpoint {
    /// `base_url` must be a bare http(s) origin; `callback_path` must be an
    /// absolute path. A trailing slash on either is dropped.
    pub fn new(base_url: &str, callback_path: &str) -> SetupResult<Self> {
        Ok(Self {
            origin: normalize_origin(base_url)?,
            callback_path: normalize_callback_path(callback_path)?,
        })
    }

    /// Serialized origin, e.g. `https://bot.example.com`.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Normalized path, e.g. `/flow/messages`.
    pub fn callback_path(&self) -> &str {
        &self.callback_path
    }

    /// Path for a given token: `{callback_path}/{token}`.
    pub fn path_for_token(&self, token: &str) -> String {
        format!("{}/{}", self.callback_path, token)
    }

    /// Absolute URL for `path` with `params` form-encoded and sorted by name.
    pub fn url_for<K, V>(&self, path: &str, params: &[(K, V)]) -> String
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut url = format!("{}{}", self.origin, path);
        let query = canonical_query(params);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        url
    }

    /// The token segment of a request path under the callback path, if the
    /// path is exactly `{callback_path}/{token}`.
    pub fn token_from_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.callback_path.as_str())?;
        let token = rest.strip_prefix('/')?;
        let token = token.strip_suffix('/').unwrap_or(token);
        if token.is_empty() || token.contains('/') {
            return None;
        }
        Some(token)
    }
}

/// Form-encode `params` sorted by name (then value, for repeated names).
pub fn canonical_query<K, V>(params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut sorted: Vec<(&str, &str)> = params
        .iter()
        .map(|(k, v)| (k.as_ref(), v.as_ref()))
        .collect();
    sorted.sort();
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(sorted)
        .finish()
}

fn normalize_origin(base_url: &str) -> SetupResult<String> {
    let invalid = |why: &str| SetupError::InvalidBaseUrl(format!("{}: {}", base_url, why));

    let url = Url::parse(base_url).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("host is required"));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(invalid("credentials are not allowed"));
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("must be an origin without path, query or fragment"));
    }
    Ok(url.origin().ascii_serialization())
}

fn normalize_callback_path(path: &str) -> SetupResult<String> {
    let invalid = |why: &str| SetupError::InvalidCallbackPath(format!("{}: {}", path, why));

    if !path.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }
    if path
        .chars()
        .any(|c| c == '?' || c == '#' || c == '%' || c.is_whitespace() || c.is_control())
    {
        return Err(invalid("contains a reserved character"));
    }
    if path.contains("//") {
        return Err(invalid("contains an empty segment"));
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(invalid("must name at least one segment"));
    }
    Ok(trimmed.to_string())
}
