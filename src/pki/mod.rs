//! Local key, CSR and certificate handling.
//!
//! Signing happens in Vault. This module only builds requests, parses what
//! Vault returned, and writes the results to disk.

pub mod artifact;
pub mod csr;
pub mod error;
pub mod keys;
pub mod san;
pub mod store;

pub use artifact::CertificateArtifact;
pub use csr::{build_csr, SigningRequest};
pub use error::PkiError;
pub use keys::{generate_key_pair, KeyPairPem};
