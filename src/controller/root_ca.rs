//! Root CA: generated inside Vault, never exported.

use tracing::{debug, info, warn};

use crate::config::RootCaSpec;
use crate::errors::{Error, Result};
use crate::pki::artifact::certificate_not_after;
use crate::secrets::backend::fields;
use crate::secrets::responses::{decode, CaCertificateResponse};
use crate::secrets::SecretsBackend;

pub(super) async fn ensure<B: SecretsBackend + ?Sized>(backend: &B, spec: &RootCaSpec) -> Result<()> {
    let name = spec.name.as_str();
    let path = format!("{}/cert/ca", spec.root_path);

    let existing = backend.read(&path).await.map_err(|e| {
        warn!(name, common_name = %spec.common_name, error = %e, "Failed to read existing root CA");
        Error::reconcile("read root-ca", name, e.into())
    })?;

    let certificate = match existing {
        Some(data) => decode::<CaCertificateResponse>(&path, data)
            .map_err(|e| Error::reconcile("read root-ca", name, e.into()))?
            .certificate,
        None => String::new(),
    };

    if !certificate.trim().is_empty() {
        report_existing(spec, &certificate);
        return Ok(());
    }

    let path = format!("{}/root/generate/internal", spec.root_path);
    let data = fields([("common_name", spec.common_name.as_str()), ("ttl", spec.ttl.as_str())]);
    backend
        .write(&path, data)
        .await
        .map_err(|e| Error::reconcile("generate root-ca", name, e.into()))?;

    info!(name, common_name = %spec.common_name, "Root CA generated");
    Ok(())
}

/// An existing root is never regenerated; one inside its threshold is only
/// reported.
fn report_existing(spec: &RootCaSpec, pem: &str) {
    let name = spec.name.as_str();
    match certificate_not_after(pem) {
        Ok(not_after) => {
            let remaining = (not_after - time::OffsetDateTime::now_utc()).whole_hours().max(0);
            if remaining < spec.renewal_threshold().as_secs() as i64 / 3600 {
                warn!(name, remaining_hours = remaining, "Root CA is inside its renewal threshold, rotate it manually");
            } else {
                debug!(name, remaining_hours = remaining, "Root CA exists");
            }
        }
        Err(e) => warn!(name, error = %e, "Existing root CA certificate could not be parsed"),
    }
}
