use thiserror::Error;

/// Why an inbound request was refused.
///
/// Messages are generic on purpose: none of them carry signatures, keys, or
/// URLs, and every variant maps to the same 403 at the HTTP boundary. None
/// is retryable; the caller needs a freshly signed URL.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthError {
    #[error("malformed credentials")]
    MalformedCredentials,

    #[error("missing parameters")]
    MissingParameters,

    #[error("unsupported version")]
    UnsupportedVersion,

    #[error("credentials not yet valid")]
    NotYetValid,

    #[error("credentials expired")]
    Expired,

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("invalid token")]
    InvalidToken,

    #[error("scope not permitted")]
    ScopeNotPermitted,
}

impl AuthError {
    /// Stable snake_case label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MalformedCredentials => "malformed_credentials",
            AuthError::MissingParameters => "missing_parameters",
            AuthError::UnsupportedVersion => "unsupported_version",
            AuthError::NotYetValid => "not_yet_valid",
            AuthError::Expired => "expired",
            AuthError::SignatureMismatch => "signature_mismatch",
            AuthError::InvalidToken => "invalid_token",
            AuthError::ScopeNotPermitted => "scope_not_permitted",
        }
    }
}

/// Typed failure from `SharedAccessCredentials::parse_from_query`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("duplicate field: {0}")]
    DuplicateField(&'static str),

    #[error("invalid action value")]
    InvalidAction,

    #[error("invalid timestamp in field: {0}")]
    InvalidTimestamp(&'static str),
}

impl From<ParseError> for AuthError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::MissingField(_) => AuthError::MissingParameters,
            _ => AuthError::MalformedCredentials,
        }
    }
}

/// Construction-time problems. These surface once, at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("secret key rejected")]
    InvalidKey,

    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),

    #[error("invalid callback path: {0}")]
    InvalidCallbackPath(String),

    #[error("protection purpose must not be empty")]
    EmptyPurpose,

    #[error("at least one allowed version is required")]
    NoAllowedVersions,

    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("key derivation failed")]
    KeyDerivation,
}

impl From<sasgate_core::CoreError> for SetupError {
    fn from(err: sasgate_core::CoreError) -> Self {
        match err {
            sasgate_core::CoreError::EmptyKey => SetupError::InvalidKey,
            sasgate_core::CoreError::KeyDerivation => SetupError::KeyDerivation,
            sasgate_core::CoreError::InvalidTimestamp(t) => SetupError::InvalidPolicy(t),
        }
    }
}

/// Failures while minting a callback URL.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IssueError {
    #[error("routing id must not be empty")]
    EmptyRoutingId,

    #[error("token protection failed")]
    TokenProtection,

    #[error("query parameter '{0}' is reserved for the signature")]
    ReservedParam(String),

    #[error("query parameter '{0}' is not in the signed parameter list")]
    UnsignedParam(String),

    #[error("policy window is out of range")]
    TimestampOutOfRange,
}

pub type AuthResult<T> = Result<T, AuthError>;
pub type SetupResult<T> = Result<T, SetupError>;
pub type IssueResult<T> = Result<T, IssueError>;
