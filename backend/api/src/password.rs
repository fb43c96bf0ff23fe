//! Admin credential hashing.
//!
//! Passwords are stored as hex-encoded scrypt output alongside a per-record
//! random salt. The salt's hex string, not its raw bytes, is the scrypt salt
//! input; existing stored hashes depend on that.

use rand::RngCore;
use scrypt::{scrypt, Params};
use subtle::ConstantTimeEq;

use crate::errors::{AppError, Result};

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 64;

// N = 2^14, r = 8, p = 1. Tests use a tiny N so the suite stays fast.
const PRODUCTION_LOG_N: u8 = 14;
#[cfg(not(test))]
const LOG_N: u8 = PRODUCTION_LOG_N;
#[cfg(test)]
const LOG_N: u8 = 4;
const R: u32 = 8;
const P: u32 = 1;

/// A salted hash ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedPassword {
    pub hash: String,
    pub salt: String,
}

/// Hash `plaintext` under a freshly generated salt.
pub fn hash(plaintext: &str) -> Result<HashedPassword> {
    let mut salt_bytes = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = hex::encode(salt_bytes);

    let derived = derive(plaintext, &salt)?;
    Ok(HashedPassword {
        hash: hex::encode(derived),
        salt,
    })
}

/// Recompute the hash of `plaintext` with `salt` and compare in constant time.
pub fn verify(plaintext: &str, stored_hash: &str, salt: &str) -> Result<bool> {
    let Ok(expected) = hex::decode(stored_hash) else {
        return Ok(false);
    };
    if expected.len() != HASH_LEN {
        return Ok(false);
    }
    let derived = derive(plaintext, salt)?;
    Ok(derived[..].ct_eq(&expected[..]).into())
}

fn derive(plaintext: &str, salt: &str) -> Result<[u8; HASH_LEN]> {
    derive_with(plaintext, salt, LOG_N)
}

fn derive_with(plaintext: &str, salt: &str, log_n: u8) -> Result<[u8; HASH_LEN]> {
    let params = Params::new(log_n, R, P, HASH_LEN)
        .map_err(|e| AppError::Internal(format!("scrypt params: {e}")))?;
    let mut out = [0u8; HASH_LEN];
    scrypt(plaintext.as_bytes(), salt.as_bytes(), &params, &mut out)
        .map_err(|e| AppError::Internal(format!("scrypt: {e}")))?;
    Ok(out)
}
