//! Intermediate CA: generated in its own mount, signed by the root, cached in
//! KV and exported to disk.

use tracing::info;

use super::{persist_certificate, sync_certificate_files, valid_stored_certificate};
use crate::config::CaSpec;
use crate::errors::{Error, Result};
use crate::secrets::backend::fields;
use crate::secrets::responses::{
    decode_required, IntermediateCsrResponse, SignedCertificateResponse, StoredCertificate,
};
use crate::secrets::SecretsBackend;

const KIND: &str = "intermediate-ca";

pub(super) async fn ensure<B: SecretsBackend + ?Sized>(backend: &B, spec: &CaSpec) -> Result<()> {
    let name = spec.name.as_str();

    if let Some(artifact) =
        valid_stored_certificate(backend, KIND, &spec.kv_path, name, spec.renewal_threshold()).await?
    {
        return sync_certificate_files(name, &spec.host_path, &artifact);
    }

    let stored = generate(backend, spec)
        .await
        .map_err(|e| Error::reconcile("generate intermediate-ca", name, e))?;
    persist_certificate(backend, name, &spec.kv_path, &spec.host_path, &stored).await?;

    info!(name, common_name = %spec.intermediate_common_name(), "Intermediate CA issued");
    Ok(())
}

async fn generate<B: SecretsBackend + ?Sized>(backend: &B, spec: &CaSpec) -> Result<StoredCertificate> {
    // Generate the intermediate key and CSR, exporting the key.
    let path = format!("{}/intermediate/generate/exported", spec.ca_path);
    let common_name = spec.intermediate_common_name();
    let data = fields([("common_name", common_name.as_str()), ("ttl", spec.ttl.as_str())]);
    let response = backend.write(&path, data).await?;
    let IntermediateCsrResponse { csr, private_key } = decode_required(&path, response)?;

    // Have the root sign it.
    let path = format!("{}/root/sign-intermediate", spec.root_path);
    let data = fields([("csr", csr.as_str()), ("format", "pem_bundle"), ("ttl", spec.ttl.as_str())]);
    let response = backend.write(&path, data).await?;
    let signed: SignedCertificateResponse = decode_required(&path, response)?;

    // Install the signed certificate in the intermediate mount.
    let path = format!("{}/intermediate/set-signed", spec.ca_path);
    backend.write(&path, fields([("certificate", signed.certificate.as_str())])).await?;

    Ok(StoredCertificate { certificate: signed.certificate, private_key })
}
