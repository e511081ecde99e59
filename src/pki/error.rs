//! Error types for key, CSR and certificate handling

/// Errors raised while generating keys and requests or parsing stored PEM.
#[derive(Debug, thiserror::Error)]
pub enum PkiError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("CSR generation failed: {0}")]
    CsrGeneration(String),

    #[error("Invalid {what} PEM: {reason}")]
    InvalidPem { what: &'static str, reason: String },

    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),
}

impl PkiError {
    pub fn key_generation<S: Into<String>>(message: S) -> Self {
        Self::KeyGeneration(message.into())
    }

    pub fn csr_generation<S: Into<String>>(message: S) -> Self {
        Self::CsrGeneration(message.into())
    }

    pub fn invalid_pem<S: Into<String>>(what: &'static str, reason: S) -> Self {
        Self::InvalidPem { what, reason: reason.into() }
    }

    pub fn invalid_certificate<S: Into<String>>(message: S) -> Self {
        Self::InvalidCertificate(message.into())
    }
}

pub type Result<T> = std::result::Result<T, PkiError>;
