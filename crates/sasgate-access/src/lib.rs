//! Shared Access Signatures for webhook callbacks.
//!
//! Outbound, [`CallbackUrlIssuer`] mints a URL that embeds an encrypted
//! routing token and an HMAC signature over a [`SharedAccessPolicy`].
//! Inbound, [`InboundRequestAuthorizer`] rebuilds the signed URL from the
//! request, validates the credentials and hands the decrypted routing id to
//! the handler.
//!
//! Key features:
//! - HMAC-SHA256 signatures over a fixed canonical string, base64url encoded
//! - Constant-time signature comparison with dual-key rotation
//! - Hierarchical scope and bit-set action model
//! - AES-256-GCM routing tokens, purpose-bound via HKDF sub-keys
//! - Generic rejection errors that never echo secrets or URLs

pub mod authorizer;
pub mod compare;
pub mod credentials;
pub mod endpoint;
pub mod error;
pub mod extractor;
pub mod issuer;
pub mod policy;
pub mod protector;
pub mod scope;
pub mod signer;
pub mod validator;

pub use authorizer::{action_for_method, AuthorizedRequest, InboundRequestAuthorizer};
pub use compare::secure_equals;
pub use credentials::{is_sas_param, SharedAccessCredentials, DEFAULT_SIGNED_PARAMS};
pub use endpoint::{canonical_query, CallbackEndpoint};
pub use error::{
    AuthError, AuthResult, IssueError, IssueResult, ParseError, SetupError, SetupResult,
};
pub use extractor::{
    extract_credentials, extract_credentials_from_query, extract_credentials_from_uri,
};
pub use issuer::{CallbackGrant, CallbackUrlIssuer};
pub use policy::{SharedAccessPolicy, CURRENT_VERSION};
pub use protector::{truncate_routing_id, ChannelTokenProtector, ProtectedToken};
pub use scope::{AccessAction, AccessScope};
pub use signer::{canonical_string, PolicySigner, SIGNATURE_LEN};
pub use validator::{SasValidator, SigningKeys};
