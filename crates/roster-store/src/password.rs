//! Salted SHA-256 password digests.
//!
//! Stored form: `base64(salt)$base64(sha256(salt || password))`.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    digest_with_salt(&salt, password)
}

/// Check a password against a stored digest. Malformed digests never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_b64, _)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = STANDARD_NO_PAD.decode(salt_b64) else {
        return false;
    };
    digest_with_salt(&salt, password) == stored
}

fn digest_with_salt(salt: &[u8], password: &str) -> String {
    let hash = Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize();
    format!("{}${}", STANDARD_NO_PAD.encode(salt), STANDARD_NO_PAD.encode(hash))
}
