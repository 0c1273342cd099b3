use hkdf::Hkdf;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{CoreError, CoreResult};
use crate::types::SecretKey;

const HKDF_SALT: &[u8] = b"sasgate-subkey-v1";

/// Derive a 256-bit sub-key from the master secret.
///
/// Distinct `info` labels yield independent keys, so one master secret can
/// serve several purposes without a token for one being usable for another.
pub fn derive_subkey(master: &SecretKey, info: &[u8]) -> CoreResult<Zeroizing<[u8; 32]>> {
    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), master.expose());
    let mut okm = Zeroizing::new([0u8; 32]);
    hk.expand(info, &mut *okm)
        .map_err(|_| CoreError::KeyDerivation)?;
    Ok(okm)
}

/// Fill a fixed-size array from the OS RNG.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Short, non-reversible key fingerprint for logs: first 8 hex chars of
/// SHA-256(key).
pub fn key_fingerprint(key: &SecretKey) -> String {
    let digest = Sha256::digest(key.expose());
    digest[..4].iter().map(|b| format!("{:02x}", b)).collect()
}
