//! Raw RSA key pairs kept in KV and exported as `.pem` / `.pub`.

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use tracing::{debug, info, warn};

use crate::config::KeyPairSpec;
use crate::errors::{Error, Result};
use crate::pki::{generate_key_pair, store, KeyPairPem, PkiError};
use crate::secrets::responses::{decode, encode, StoredKeyPair};
use crate::secrets::SecretsBackend;

pub(super) async fn ensure<B: SecretsBackend + ?Sized>(backend: &B, spec: &KeyPairSpec) -> Result<()> {
    let name = spec.name.as_str();

    let stored = backend
        .get_secret(&spec.kv_path, name)
        .await
        .map_err(|e| Error::reconcile("look up stored key pair", name, e.into()))?;

    if let Some(existing) = stored.and_then(|data| usable(spec, data)) {
        return sync_files(spec, &existing);
    }

    let size = spec.size;
    let generated = tokio::task::spawn_blocking(move || generate_key_pair(size))
        .await
        .map_err(|e| PkiError::key_generation(format!("key generation task failed: {}", e)))
        .and_then(|result| result)
        .map_err(|e| Error::reconcile("generate key pair", name, e.into()))?;

    let KeyPairPem { private_key_pem, public_key_pem } = generated;
    let stored = StoredKeyPair { private_key: private_key_pem, public_key: public_key_pem };
    backend
        .put_secret(&spec.kv_path, name, encode(&stored)?)
        .await
        .map_err(|e| Error::reconcile("save key pair in KV", name, e.into()))?;

    store::store_key_pair(&spec.host_path, stored.private_key.expose_secret(), &stored.public_key)
        .map_err(|e| Error::reconcile("store key pair files", name, e))?;

    info!(name, size, "Key pair generated");
    Ok(())
}

/// The stored pair, if it decodes and holds an RSA private key.
fn usable(spec: &KeyPairSpec, data: crate::secrets::Fields) -> Option<StoredKeyPair> {
    let location = format!("{}/{}", spec.kv_path, spec.name);
    let stored: StoredKeyPair = match decode(&location, data) {
        Ok(stored) => stored,
        Err(e) => {
            warn!(name = %spec.name, error = %e, "Stored key pair is malformed, regenerating");
            return None;
        }
    };

    let pem = stored.private_key.expose_secret();
    let parses = rsa::RsaPrivateKey::from_pkcs1_pem(pem).is_ok()
        || rsa::RsaPrivateKey::from_pkcs8_pem(pem).is_ok();
    if !parses || stored.public_key.trim().is_empty() {
        warn!(name = %spec.name, "Stored key pair does not parse, regenerating");
        return None;
    }

    debug!(name = %spec.name, "Stored key pair is valid");
    Some(stored)
}

fn sync_files(spec: &KeyPairSpec, stored: &StoredKeyPair) -> Result<()> {
    let public_path = store::with_suffix(&spec.host_path, ".pub");
    let private_path = store::with_suffix(&spec.host_path, ".pem");
    let on_disk = std::fs::read_to_string(&public_path).ok();
    if on_disk.as_deref() == Some(stored.public_key.as_str()) && private_path.exists() {
        return Ok(());
    }

    info!(name = %spec.name, path = %spec.host_path.display(), "Exporting stored key pair to host");
    store::store_key_pair(&spec.host_path, stored.private_key.expose_secret(), &stored.public_key)
        .map_err(|e| Error::reconcile("store key pair files", &spec.name, e))
}
