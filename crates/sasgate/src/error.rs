use thiserror::Error;

/// Error type for the sasgate binary, aggregating errors from the workspace
/// crates plus configuration and I/O failures.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("setup error: {0}")]
    Setup(#[from] sasgate_access::SetupError),

    #[error("issue error: {0}")]
    Issue(#[from] sasgate_access::IssueError),

    /// Rejection of a URL checked offline. Generic, like the HTTP 403.
    #[error("request rejected: {0}")]
    Auth(#[from] sasgate_access::AuthError),

    #[error("core error: {0}")]
    Core(#[from] sasgate_core::CoreError),

    #[error("secret key not set: environment variable {0} is missing or empty")]
    MissingSecret(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

pub type RootResult<T> = Result<T, RootError>;
