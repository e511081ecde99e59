//! Leaf certificates: CSR built locally, signed by an intermediate's role.

use tracing::info;

use super::{persist_certificate, sync_certificate_files, valid_stored_certificate};
use crate::config::CertificateSpec;
use crate::errors::{Error, Result};
use crate::pki::build_csr;
use crate::secrets::backend::fields;
use crate::secrets::responses::{decode_required, SignedCertificateResponse, StoredCertificate};
use crate::secrets::SecretsBackend;

const KIND: &str = "certificate";

pub(super) async fn ensure<B: SecretsBackend + ?Sized>(
    backend: &B,
    spec: &CertificateSpec,
    issuer_path: &str,
) -> Result<()> {
    let name = spec.name.as_str();

    if let Some(artifact) =
        valid_stored_certificate(backend, KIND, &spec.kv_path, name, spec.renewal_threshold()).await?
    {
        return sync_certificate_files(name, &spec.host_path, &artifact);
    }

    let stored = issue(backend, spec, issuer_path)
        .await
        .map_err(|e| Error::reconcile("issue certificate", name, e))?;
    persist_certificate(backend, name, &spec.kv_path, &spec.host_path, &stored).await?;

    info!(name, common_name = %spec.spec.subject.common_name, issuer = %spec.issuer, "Certificate issued");
    Ok(())
}

async fn issue<B: SecretsBackend + ?Sized>(
    backend: &B,
    spec: &CertificateSpec,
    issuer_path: &str,
) -> Result<StoredCertificate> {
    let request = build_csr(&spec.spec).await?;

    let path = format!("{}/sign/{}", issuer_path, spec.role);
    let data = fields([
        ("csr", request.csr_pem.as_str()),
        ("common_name", spec.spec.subject.common_name.as_str()),
        ("ttl", spec.ttl.as_str()),
        ("format", "pem"),
    ]);
    let response = backend.write(&path, data).await?;
    let signed: SignedCertificateResponse = decode_required(&path, response)?;

    Ok(StoredCertificate { certificate: signed.certificate, private_key: request.private_key_pem })
}
