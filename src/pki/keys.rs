//! RSA key generation.
//!
//! Generation is CPU bound; async callers run it on the blocking pool.

use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};

use super::error::{PkiError, Result};
use crate::secrets::SecretString;

/// PEM encoded RSA key pair.
#[derive(Debug, Clone)]
pub struct KeyPairPem {
    /// PKCS#1 (`RSA PRIVATE KEY`)
    pub private_key_pem: SecretString,
    /// SubjectPublicKeyInfo (`PUBLIC KEY`)
    pub public_key_pem: String,
}

pub fn generate_rsa(bits: usize) -> Result<RsaPrivateKey> {
    RsaPrivateKey::new(&mut rand::thread_rng(), bits)
        .map_err(|e| PkiError::key_generation(format!("{} bit RSA key: {}", bits, e)))
}

/// PKCS#1 PEM of `key`.
pub fn pkcs1_pem(key: &RsaPrivateKey) -> Result<SecretString> {
    let pem = key
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| PkiError::key_generation(format!("encode PKCS#1: {}", e)))?;
    Ok(SecretString::new(pem.as_str()))
}

pub fn public_key_pem(key: &RsaPrivateKey) -> Result<String> {
    RsaPublicKey::from(key)
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| PkiError::key_generation(format!("encode public key: {}", e)))
}

/// Generate a fresh key pair of `bits` bits.
pub fn generate_key_pair(bits: usize) -> Result<KeyPairPem> {
    let key = generate_rsa(bits)?;
    Ok(KeyPairPem { private_key_pem: pkcs1_pem(&key)?, public_key_pem: public_key_pem(&key)? })
}
