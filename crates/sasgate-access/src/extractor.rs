//! Pull SAS credentials out of an inbound request.
//!
//! Only the query string of the request URI is read; the body is never
//! touched.

use http::{Request, Uri};

use crate::credentials::SharedAccessCredentials;
use crate::error::AuthResult;

pub fn extract_credentials<B>(request: &Request<B>) -> AuthResult<SharedAccessCredentials> {
    extract_credentials_from_uri(request.uri())
}

pub fn extract_credentials_from_uri(uri: &Uri) -> AuthResult<SharedAccessCredentials> {
    extract_credentials_from_query(uri.query().unwrap_or(""))
}

/// Parse a raw (still percent-encoded) query string.
pub fn extract_credentials_from_query(query: &str) -> AuthResult<SharedAccessCredentials> {
    let pairs = url::form_urlencoded::parse(query.as_bytes());
    Ok(SharedAccessCredentials::parse_from_query(pairs)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::scope::AccessAction;

    #[test]
    fn test_extract_from_request() {
        let req = Request::builder()
            .method("POST")
            .uri("/flow/messages/tok?sv=1.0&sr=%2F&sp=128&channelId=19%3Aabc&sig=abc")
            .body(())
            .unwrap();
        let creds = extract_credentials(&req).unwrap();
        assert_eq!(creds.version, "1.0");
        assert_eq!(creds.scope, "/");
        assert_eq!(creds.action, AccessAction::WILDCARD);
        assert_eq!(creds.signature, "abc");
    }

    #[test]
    fn test_extract_decodes_percent_encoding() {
        let creds = extract_credentials_from_query(
            "sv=1.0&sr=%2Fflow&sp=2&se=2023-11-14T22%3A13%3A20Z&sig=a%2Bb",
        )
        .unwrap();
        assert_eq!(creds.scope, "/flow");
        assert_eq!(creds.signature, "a+b");
        assert!(creds.expire_time.is_some());
    }

    #[test]
    fn test_no_query_is_missing_parameters() {
        let uri: Uri = "/flow/messages/tok".parse().unwrap();
        assert_eq!(
            extract_credentials_from_uri(&uri),
            Err(AuthError::MissingParameters)
        );
    }

    #[test]
    fn test_missing_scope_is_missing_parameters() {
        assert_eq!(
            extract_credentials_from_query("sv=1.0&sp=128&sig=abc"),
            Err(AuthError::MissingParameters)
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert_eq!(
            extract_credentials_from_query("sv=1.0&sr=%2F&sp=banana&sig=abc"),
            Err(AuthError::MalformedCredentials)
        );
        assert_eq!(
            extract_credentials_from_query("sv=1.0&sv=1.0&sr=%2F&sp=1&sig=abc"),
            Err(AuthError::MalformedCredentials)
        );
    }
}
