//! Wire form of a signed policy: URL query parameters.
//!
//! Parameter names (`sv`, `sr`, `sp`, `st`, `se`, `sig`) are the contract
//! between the issuer and the validator. Names are matched
//! ASCII-case-insensitively on the way in; non-SAS parameters are ignored.

use sasgate_core::Timestamp;

use crate::error::ParseError;
use crate::policy::SharedAccessPolicy;
use crate::scope::AccessAction;

pub const VERSION_PARAM: &str = "sv";
pub const SCOPE_PARAM: &str = "sr";
pub const ACTION_PARAM: &str = "sp";
pub const START_PARAM: &str = "st";
pub const EXPIRE_PARAM: &str = "se";
pub const SIGNATURE_PARAM: &str = "sig";

const SAS_PARAMS: [&str; 6] = [
    VERSION_PARAM,
    SCOPE_PARAM,
    ACTION_PARAM,
    START_PARAM,
    EXPIRE_PARAM,
    SIGNATURE_PARAM,
];

/// Whether `name` is one of the reserved SAS parameter names.
pub fn is_sas_param(name: &str) -> bool {
    SAS_PARAMS.iter().any(|p| p.eq_ignore_ascii_case(name))
}

/// Domain parameters that are part of the signed URL by default.
pub const DEFAULT_SIGNED_PARAMS: [&str; 4] = ["channelId", "flowName", "serviceName", "filterName"];

pub(crate) fn default_signed_params() -> Vec<String> {
    DEFAULT_SIGNED_PARAMS.iter().map(|s| s.to_string()).collect()
}

/// Signed-parameter list with the reserved SAS names removed.
pub(crate) fn signed_param_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names
        .into_iter()
        .map(Into::into)
        .filter(|name: &String| !is_sas_param(name))
        .collect()
}

/// Policy fields plus signature, as carried on the wire.
///
/// Fields may be empty when parsed from a request; the validator's presence
/// check is what rejects them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedAccessCredentials {
    pub version: String,
    pub scope: String,
    pub action: AccessAction,
    pub start_time: Option<Timestamp>,
    pub expire_time: Option<Timestamp>,
    pub signature: String,
}

impl SharedAccessCredentials {
    pub fn new(policy: &SharedAccessPolicy, signature: impl Into<String>) -> Self {
        Self {
            version: policy.version.clone(),
            scope: policy.scope.as_str().to_string(),
            action: policy.action,
            start_time: policy.start_time,
            expire_time: policy.expire_time,
            signature: signature.into(),
        }
    }

    /// Render as ordered query pairs: `sv`, `sr`, `sp`, `st`?, `se`?, `sig`.
    pub fn serialize_to_query(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            (VERSION_PARAM, self.version.clone()),
            (SCOPE_PARAM, self.scope.clone()),
            (ACTION_PARAM, self.action.to_wire()),
        ];
        if let Some(start) = self.start_time {
            pairs.push((START_PARAM, start.to_rfc3339()));
        }
        if let Some(expire) = self.expire_time {
            pairs.push((EXPIRE_PARAM, expire.to_rfc3339()));
        }
        pairs.push((SIGNATURE_PARAM, self.signature.clone()));
        pairs
    }

    /// `application/x-www-form-urlencoded` form of [`serialize_to_query`].
    ///
    /// [`serialize_to_query`]: Self::serialize_to_query
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.serialize_to_query())
            .finish()
    }

    /// Strict inverse of [`serialize_to_query`](Self::serialize_to_query).
    pub fn parse_from_query<I, K, V>(pairs: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut version = None;
        let mut scope = None;
        let mut action = None;
        let mut start = None;
        let mut expire = None;
        let mut signature = None;

        for (key, value) in pairs {
            let key = key.as_ref();
            let (slot, name) = if key.eq_ignore_ascii_case(VERSION_PARAM) {
                (&mut version, VERSION_PARAM)
            } else if key.eq_ignore_ascii_case(SCOPE_PARAM) {
                (&mut scope, SCOPE_PARAM)
            } else if key.eq_ignore_ascii_case(ACTION_PARAM) {
                (&mut action, ACTION_PARAM)
            } else if key.eq_ignore_ascii_case(START_PARAM) {
                (&mut start, START_PARAM)
            } else if key.eq_ignore_ascii_case(EXPIRE_PARAM) {
                (&mut expire, EXPIRE_PARAM)
            } else if key.eq_ignore_ascii_case(SIGNATURE_PARAM) {
                (&mut signature, SIGNATURE_PARAM)
            } else {
                continue;
            };
            if slot.is_some() {
                return Err(ParseError::DuplicateField(name));
            }
            *slot = Some(value.as_ref().to_string());
        }

        let version = version.ok_or(ParseError::MissingField(VERSION_PARAM))?;
        let scope = scope.ok_or(ParseError::MissingField(SCOPE_PARAM))?;
        let action = action.ok_or(ParseError::MissingField(ACTION_PARAM))?;
        let signature = signature.ok_or(ParseError::MissingField(SIGNATURE_PARAM))?;

        Ok(Self {
            version,
            scope,
            action: AccessAction::from_wire(&action)?,
            start_time: parse_time(start, START_PARAM)?,
            expire_time: parse_time(expire, EXPIRE_PARAM)?,
            signature,
        })
    }
}

fn parse_time(value: Option<String>, field: &'static str) -> Result<Option<Timestamp>, ParseError> {
    value
        .map(|v| Timestamp::parse_rfc3339(&v).map_err(|_| ParseError::InvalidTimestamp(field)))
        .transpose()
}
