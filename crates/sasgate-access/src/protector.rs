//! Opaque routing tokens for public callback paths.
//!
//! A routing id is sealed with AES-256-GCM under a sub-key derived from the
//! master secret and a purpose label. The purpose is also bound as associated
//! data, so a token minted for one purpose never opens under another.
//!
//! Wire form: base64url-nopad(`0x01` ‖ nonce(12) ‖ ciphertext+tag(16)).

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce as AesNonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sasgate_core::{derive_subkey, random_bytes, ProtectionPurpose, RoutingId, SecretKey};

use crate::error::{AuthError, AuthResult, IssueError, IssueResult, SetupError, SetupResult};

const TOKEN_FORMAT_V1: u8 = 0x01;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const SUBKEY_INFO_PREFIX: &str = "sasgate/channel-token/";

/// An encrypted routing id, safe to place in a URL path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProtectedToken {
    ciphertext: String,
}

impl ProtectedToken {
    pub fn from_wire(token: impl Into<String>) -> Self {
        Self {
            ciphertext: token.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.ciphertext
    }
}

impl fmt::Display for ProtectedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ciphertext)
    }
}

pub struct ChannelTokenProtector {
    cipher: Aes256Gcm,
    previous: Option<Aes256Gcm>,
    purpose: ProtectionPurpose,
}

impl ChannelTokenProtector {
    pub fn new(master: &SecretKey, purpose: impl Into<ProtectionPurpose>) -> SetupResult<Self> {
        let purpose = purpose.into();
        if purpose.as_str().trim().is_empty() {
            return Err(SetupError::EmptyPurpose);
        }
        let cipher = purpose_cipher(master, &purpose)?;
        Ok(Self {
            cipher,
            previous: None,
            purpose,
        })
    }

    /// Also open tokens sealed under `previous` (never seal with it).
    pub fn with_previous_key(mut self, previous: &SecretKey) -> SetupResult<Self> {
        self.previous = Some(purpose_cipher(previous, &self.purpose)?);
        Ok(self)
    }

    pub fn purpose(&self) -> &ProtectionPurpose {
        &self.purpose
    }

    /// Seal `routing_id`. Each call uses a fresh nonce, so the same id never
    /// yields the same token twice.
    pub fn protect(&self, routing_id: &str) -> IssueResult<ProtectedToken> {
        if routing_id.is_empty() {
            return Err(IssueError::EmptyRoutingId);
        }
        let nonce_bytes: [u8; NONCE_LEN] = random_bytes();
        let sealed = self
            .cipher
            .encrypt(
                AesNonce::from_slice(&nonce_bytes),
                Payload {
                    msg: routing_id.as_bytes(),
                    aad: self.purpose.as_str().as_bytes(),
                },
            )
            .map_err(|_| IssueError::TokenProtection)?;

        let mut raw = Vec::with_capacity(1 + NONCE_LEN + sealed.len());
        raw.push(TOKEN_FORMAT_V1);
        raw.extend_from_slice(&nonce_bytes);
        raw.extend_from_slice(&sealed);
        Ok(ProtectedToken {
            ciphertext: URL_SAFE_NO_PAD.encode(raw),
        })
    }

    /// Open a token. Any decoding, format or authentication failure is
    /// reported as [`AuthError::InvalidToken`].
    pub fn unprotect(&self, token: &str) -> AuthResult<RoutingId> {
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| AuthError::InvalidToken)?;
        if raw.len() < 1 + NONCE_LEN + TAG_LEN || raw[0] != TOKEN_FORMAT_V1 {
            return Err(AuthError::InvalidToken);
        }
        let (nonce, sealed) = raw[1..].split_at(NONCE_LEN);
        let plain = self
            .open(&self.cipher, nonce, sealed)
            .or_else(|| {
                self.previous
                    .as_ref()
                    .and_then(|prev| self.open(prev, nonce, sealed))
            })
            .ok_or(AuthError::InvalidToken)?;
        let id = String::from_utf8(plain).map_err(|_| AuthError::InvalidToken)?;
        Ok(RoutingId::new(id))
    }

    fn open(&self, cipher: &Aes256Gcm, nonce: &[u8], sealed: &[u8]) -> Option<Vec<u8>> {
        cipher
            .decrypt(
                AesNonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: self.purpose.as_str().as_bytes(),
                },
            )
            .ok()
    }
}

fn purpose_cipher(master: &SecretKey, purpose: &ProtectionPurpose) -> SetupResult<Aes256Gcm> {
    let info = format!("{}{}", SUBKEY_INFO_PREFIX, purpose.as_str());
    let subkey = derive_subkey(master, info.as_bytes())?;
    Aes256Gcm::new_from_slice(&*subkey).map_err(|_| SetupError::KeyDerivation)
}

impl fmt::Debug for ChannelTokenProtector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelTokenProtector")
            .field("purpose", &self.purpose)
            .field("has_previous", &self.previous.is_some())
            .finish_non_exhaustive()
    }
}

/// Keep at most `max_chars` characters of `id`.
///
/// Shorter ids make shorter URLs, but two ids sharing a prefix then route to
/// the same place. Only truncate when the id space makes that acceptable.
pub fn truncate_routing_id(id: &str, max_chars: usize) -> &str {
    match id.char_indices().nth(max_chars) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}
