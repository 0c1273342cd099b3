use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("secret key must not be empty")]
    EmptyKey,

    #[error("key derivation failed")]
    KeyDerivation,

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            CoreError::EmptyKey.to_string(),
            "secret key must not be empty"
        );
        assert_eq!(
            CoreError::InvalidTimestamp("yesterday".into()).to_string(),
            "invalid timestamp: yesterday"
        );
    }
}
