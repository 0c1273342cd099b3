//! HTTP-layer gate in front of the webhook handler.
//!
//! Per request: extract credentials, rebuild the URL that was signed,
//! validate, check scope against the method's action, then open the routing
//! token. Any failure is a rejection; the body is never read.

use std::sync::Arc;

use http::{Method, Request, Uri};
use sasgate_core::{Clock, RoutingId, SystemClock, Timestamp};

use crate::credentials::{default_signed_params, signed_param_names};
use crate::endpoint::CallbackEndpoint;
use crate::error::{AuthError, AuthResult};
use crate::extractor::extract_credentials_from_uri;
use crate::protector::ChannelTokenProtector;
use crate::scope::AccessAction;
use crate::validator::{SasValidator, SigningKeys};

/// Operation a request method asks for.
pub fn action_for_method(method: &Method) -> AccessAction {
    match *method {
        Method::GET | Method::HEAD => AccessAction::READ,
        Method::POST | Method::PUT | Method::PATCH => AccessAction::WRITE,
        Method::DELETE => AccessAction::DELETE,
        _ => AccessAction::RUN,
    }
}

/// What the downstream handler receives once a request is let through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedRequest {
    pub routing_id: RoutingId,
    /// Whitelisted domain parameters, sorted by name.
    pub params: Vec<(String, String)>,
    pub action: AccessAction,
    pub expire_time: Option<Timestamp>,
}

impl AuthorizedRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

pub struct InboundRequestAuthorizer {
    endpoint: CallbackEndpoint,
    protector: Arc<ChannelTokenProtector>,
    keys: SigningKeys,
    validator: SasValidator,
    signed_params: Vec<String>,
    clock: Arc<dyn Clock>,
}

impl InboundRequestAuthorizer {
    pub fn new(
        endpoint: CallbackEndpoint,
        protector: Arc<ChannelTokenProtector>,
        keys: SigningKeys,
        validator: SasValidator,
    ) -> Self {
        Self {
            endpoint,
            protector,
            keys,
            validator,
            signed_params: default_signed_params(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the set of domain parameters that take part in the signature.
    /// SAS parameter names are never treated as domain parameters.
    pub fn with_signed_params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signed_params = signed_param_names(names);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn endpoint(&self) -> &CallbackEndpoint {
        &self.endpoint
    }

    pub fn authorize<B>(&self, request: &Request<B>) -> AuthResult<AuthorizedRequest> {
        self.authorize_parts(request.method(), request.uri())
    }

    pub fn authorize_parts(&self, method: &Method, uri: &Uri) -> AuthResult<AuthorizedRequest> {
        self.authorize_at(method, uri, self.clock.now())
    }

    /// Same as [`authorize_parts`](Self::authorize_parts) with an explicit
    /// notion of "now".
    pub fn authorize_at(
        &self,
        method: &Method,
        uri: &Uri,
        now: Timestamp,
    ) -> AuthResult<AuthorizedRequest> {
        let result = self.check(method, uri, now);
        if let Err(err) = &result {
            tracing::warn!(method = %method, reason = err.kind(), "Rejected callback request");
        }
        result
    }

    fn check(&self, method: &Method, uri: &Uri, now: Timestamp) -> AuthResult<AuthorizedRequest> {
        let credentials = extract_credentials_from_uri(uri)?;

        let path = uri.path();
        let params = self.signed_params_of(uri.query().unwrap_or(""));
        let expected_url = self.endpoint.url_for(path, &params);

        self.validator
            .validate(&credentials, &expected_url, &self.keys, now)?;

        let action = action_for_method(method);
        self.validator
            .ensure_scope_permitted(&credentials, path, action)?;

        let token = self
            .endpoint
            .token_from_path(path)
            .ok_or(AuthError::InvalidToken)?;
        let routing_id = self.protector.unprotect(token)?;

        tracing::debug!(method = %method, action = %action, "Authorized callback request");

        let mut params = params;
        params.sort();
        Ok(AuthorizedRequest {
            routing_id,
            params,
            action,
            expire_time: credentials.expire_time,
        })
    }

    fn signed_params_of(&self, query: &str) -> Vec<(String, String)> {
        url::form_urlencoded::parse(query.as_bytes())
            .filter(|(k, _)| self.signed_params.iter().any(|name| name == k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }
}

impl std::fmt::Debug for InboundRequestAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundRequestAuthorizer")
            .field("endpoint", &self.endpoint)
            .field("validator", &self.validator)
            .field("signed_params", &self.signed_params)
            .finish_non_exhaustive()
    }
}
