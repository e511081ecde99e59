//! Parsing of stored certificate/key pairs.
//!
//! The reconciler only needs two answers from a stored pair: does it parse as
//! a certificate with a matching private key, and when does it expire. Any
//! parse failure means the pair is regenerated.

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey};
use rustls_pemfile::Item;
use std::time::Duration;
use time::OffsetDateTime;
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use super::error::{PkiError, Result};
use crate::secrets::SecretString;

/// A certificate and its private key, both PEM, plus the certificate's
/// expiry.
#[derive(Debug, Clone)]
pub struct CertificateArtifact {
    pub certificate_pem: String,
    pub private_key_pem: SecretString,
    pub not_after: OffsetDateTime,
}

impl CertificateArtifact {
    /// Parse a PEM pair.
    ///
    /// The first certificate in `certificate_pem` is the leaf. For RSA keys the
    /// private key must belong to that certificate.
    pub fn parse(certificate_pem: &str, private_key_pem: &str) -> Result<Self> {
        let der = first_certificate(certificate_pem)?;
        let (_, cert) = X509Certificate::from_der(&der)
            .map_err(|e| PkiError::invalid_certificate(e.to_string()))?;

        let key = private_key(private_key_pem)?;
        if let Some(public) = key.rsa_public_key_der()? {
            if public != cert.public_key().raw {
                return Err(PkiError::invalid_certificate(
                    "private key does not match certificate public key",
                ));
            }
        }

        Ok(Self {
            certificate_pem: certificate_pem.to_string(),
            private_key_pem: SecretString::new(private_key_pem),
            not_after: cert.validity().not_after.to_datetime(),
        })
    }

    /// Remaining validity from `now`; zero once expired.
    pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
        Duration::try_from(self.not_after - now).unwrap_or(Duration::ZERO)
    }

    pub fn remaining(&self) -> Duration {
        self.remaining_at(OffsetDateTime::now_utc())
    }

    /// Whether at least `threshold` of validity is left.
    pub fn is_valid_for(&self, threshold: Duration) -> bool {
        self.remaining() >= threshold
    }
}

/// Expiry of the first certificate in `pem`, for artifacts held without
/// their key (root CAs).
pub fn certificate_not_after(pem: &str) -> Result<OffsetDateTime> {
    let der = first_certificate(pem)?;
    let (_, cert) = X509Certificate::from_der(&der)
        .map_err(|e| PkiError::invalid_certificate(e.to_string()))?;
    Ok(cert.validity().not_after.to_datetime())
}

fn first_certificate(pem: &str) -> Result<Vec<u8>> {
    let mut reader = pem.as_bytes();
    for item in rustls_pemfile::read_all(&mut reader) {
        match item.map_err(|e| PkiError::invalid_pem("certificate", e.to_string()))? {
            Item::X509Certificate(der) => return Ok(der.to_vec()),
            _ => continue,
        }
    }
    Err(PkiError::invalid_pem("certificate", "no CERTIFICATE block"))
}

enum PrivateKey {
    Pkcs1(Vec<u8>),
    Pkcs8(Vec<u8>),
    Sec1,
}

impl PrivateKey {
    /// SubjectPublicKeyInfo DER of an RSA key, `None` for other key types.
    fn rsa_public_key_der(&self) -> Result<Option<Vec<u8>>> {
        let key = match self {
            Self::Pkcs1(der) => rsa::RsaPrivateKey::from_pkcs1_der(der)
                .map_err(|e| PkiError::invalid_pem("private key", e.to_string()))?,
            Self::Pkcs8(der) => match rsa::RsaPrivateKey::from_pkcs8_der(der) {
                Ok(key) => key,
                // PKCS#8 also carries EC and Ed25519 keys.
                Err(_) => return Ok(None),
            },
            Self::Sec1 => return Ok(None),
        };
        let spki = rsa::RsaPublicKey::from(&key)
            .to_public_key_der()
            .map_err(|e| PkiError::invalid_pem("private key", e.to_string()))?;
        Ok(Some(spki.as_bytes().to_vec()))
    }
}

fn private_key(pem: &str) -> Result<PrivateKey> {
    let mut reader = pem.as_bytes();
    for item in rustls_pemfile::read_all(&mut reader) {
        match item.map_err(|e| PkiError::invalid_pem("private key", e.to_string()))? {
            Item::Pkcs1Key(key) => return Ok(PrivateKey::Pkcs1(key.secret_pkcs1_der().to_vec())),
            Item::Pkcs8Key(key) => return Ok(PrivateKey::Pkcs8(key.secret_pkcs8_der().to_vec())),
            Item::Sec1Key(_) => return Ok(PrivateKey::Sec1),
            _ => continue,
        }
    }
    Err(PkiError::invalid_pem("private key", "no private key block"))
}
