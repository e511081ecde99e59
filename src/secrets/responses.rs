//! Typed views of the Vault responses keykeeper relies on.
//!
//! Each endpoint gets its own struct. A response with a missing or mistyped
//! field becomes a [`SecretsError::Decode`] naming the path instead of a
//! panic deep inside the reconciler.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::backend::Fields;
use super::error::{Result, SecretsError};
use super::types::SecretString;

/// `auth/<mount>/role/<name>/role-id`
#[derive(Debug, Deserialize)]
pub struct RoleIdResponse {
    pub role_id: SecretString,
}

/// `auth/<mount>/role/<name>/secret-id`
#[derive(Debug, Deserialize)]
pub struct SecretIdResponse {
    pub secret_id: SecretString,
}

/// `<pki>/cert/ca`
#[derive(Debug, Deserialize)]
pub struct CaCertificateResponse {
    #[serde(default)]
    pub certificate: String,
}

/// `<pki>/intermediate/generate/exported`
#[derive(Debug, Deserialize)]
pub struct IntermediateCsrResponse {
    pub csr: String,
    pub private_key: SecretString,
}

/// `<pki>/root/sign-intermediate` and `<pki>/sign/<role>`
#[derive(Debug, Deserialize)]
pub struct SignedCertificateResponse {
    pub certificate: String,
    #[serde(default)]
    pub issuing_ca: Option<String>,
    #[serde(default)]
    pub ca_chain: Option<Vec<String>>,
}

/// Certificate and key as kept in the KV store.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoredCertificate {
    pub certificate: String,
    #[serde(serialize_with = "expose")]
    pub private_key: SecretString,
}

/// Raw key pair as kept in the KV store.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoredKeyPair {
    #[serde(serialize_with = "expose")]
    pub private_key: SecretString,
    pub public_key: String,
}

fn expose<S: serde::Serializer>(
    secret: &SecretString,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Decode the field map returned for `path` into `T`.
pub fn decode<T: DeserializeOwned>(path: &str, fields: Fields) -> Result<T> {
    serde_json::from_value(serde_json::Value::Object(fields))
        .map_err(|e| SecretsError::decode(path, e.to_string()))
}

/// Decode a write response that must carry a body.
pub fn decode_required<T: DeserializeOwned>(path: &str, fields: Option<Fields>) -> Result<T> {
    let fields = fields.ok_or_else(|| SecretsError::decode(path, "response has no data"))?;
    decode(path, fields)
}

/// Encode a value for `write` / `put_secret`.
pub fn encode<T: Serialize>(value: &T) -> Result<Fields> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(SecretsError::backend_error(format!(
            "expected an object to store, got {}",
            other
        ))),
    }
}
