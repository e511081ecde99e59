//! # Error Handling
//!
//! Top-level error type for keykeeper. Each layer keeps its own `thiserror`
//! enum ([`SecretsError`], [`PkiError`]) and this type wraps them with the
//! identity or operation that failed.

use crate::pki::PkiError;
use crate::secrets::SecretsError;

/// Custom result type for keykeeper operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for keykeeper
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Secrets backend errors
    #[error(transparent)]
    Secrets(#[from] SecretsError),

    /// Key, CSR and certificate handling errors
    #[error(transparent)]
    Pki(#[from] PkiError),

    /// I/O errors with the file that was being touched
    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A reconciliation step failed for a named identity
    #[error("{operation} '{name}': {source}")]
    Reconcile {
        operation: &'static str,
        name: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create an I/O error with context
    pub fn io<S: Into<String>>(context: S, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    /// Attach the failing operation and identity name to an error.
    pub fn reconcile(operation: &'static str, name: impl Into<String>, source: Error) -> Self {
        Self::Reconcile { operation, name: name.into(), source: Box::new(source) }
    }

    /// Whether the root cause is a Vault transport failure or an overloaded
    /// server, as opposed to a rejected request or bad local state.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Secrets(e) => e.is_transient(),
            Self::Reconcile { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        // Display includes nested struct and list paths.
        Self::validation(format!("Validation failed: {}", errors))
    }
}
