//! # Reconciler
//!
//! The [`Controller`] owns the configured resources and drives each one
//! towards "present in Vault, valid for at least its renewal threshold, and
//! exported to disk".
//!
//! A pass spawns one task per resource. Tasks are independent: a failing
//! resource is logged and retried on the next pass, and never stops the
//! others. Calls for the same resource serialize on a per-resource lock, so a
//! second concurrent `ensure` observes the first one's result.

mod certificate;
mod intermediate_ca;
mod key_pair;
mod root_ca;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{CaSpec, CertificateSpec, KeyPairSpec, Resources, RootCaSpec};
use crate::errors::{Error, Result};
use crate::pki::{store, CertificateArtifact};
use crate::secrets::responses::{decode, StoredCertificate};
use crate::secrets::SecretsBackend;

/// One reconcilable identity.
#[derive(Debug, Clone)]
pub enum Resource {
    RootCa(RootCaSpec),
    IntermediateCa(CaSpec),
    /// Leaf certificate with the PKI mount of its issuing CA
    Certificate { spec: CertificateSpec, issuer_path: String },
    KeyPair(KeyPairSpec),
}

impl Resource {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RootCa(_) => "root-ca",
            Self::IntermediateCa(_) => "intermediate-ca",
            Self::Certificate { .. } => "certificate",
            Self::KeyPair(_) => "key-pair",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::RootCa(spec) => &spec.name,
            Self::IntermediateCa(spec) => &spec.name,
            Self::Certificate { spec, .. } => &spec.name,
            Self::KeyPair(spec) => &spec.name,
        }
    }

    fn lock_key(&self) -> String {
        format!("{}/{}", self.kind(), self.name())
    }

    /// Flatten validated configuration into resources.
    ///
    /// Certificates whose issuer is unknown are skipped; configuration
    /// validation rejects them before this point.
    pub fn from_config(resources: &Resources) -> Vec<Resource> {
        let mut out = Vec::new();
        out.extend(resources.root_cas.iter().cloned().map(Self::RootCa));
        out.extend(resources.intermediate_cas.iter().cloned().map(Self::IntermediateCa));
        for spec in &resources.certificates {
            match resources.issuer(&spec.issuer) {
                Some(issuer) => out.push(Self::Certificate {
                    spec: spec.clone(),
                    issuer_path: issuer.ca_path.clone(),
                }),
                None => warn!(name = %spec.name, issuer = %spec.issuer, "Skipping certificate with unknown issuer"),
            }
        }
        out.extend(resources.key_pairs.iter().cloned().map(Self::KeyPair));
        out
    }
}

/// Outcome of one reconcile pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub succeeded: usize,
    /// `kind/name` of every resource that failed or panicked
    pub failed: Vec<String>,
}

/// Reconciles a fixed set of resources against a [`SecretsBackend`].
pub struct Controller<B: ?Sized> {
    backend: Arc<B>,
    resources: Arc<Vec<Resource>>,
    locks: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl<B: ?Sized> Clone for Controller<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            resources: self.resources.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<B> Controller<B>
where
    B: SecretsBackend + ?Sized + 'static,
{
    pub fn new(backend: Arc<B>, resources: Vec<Resource>) -> Self {
        Self {
            backend,
            resources: Arc::new(resources),
            locks: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    fn lock_for(&self, resource: &Resource) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(resource.lock_key()).or_default().clone()
    }

    /// Bring one resource up to date. Idempotent.
    pub async fn ensure(&self, resource: &Resource) -> Result<()> {
        let lock = self.lock_for(resource);
        let _guard = lock.lock().await;

        let backend = self.backend.as_ref();
        match resource {
            Resource::RootCa(spec) => root_ca::ensure(backend, spec).await,
            Resource::IntermediateCa(spec) => intermediate_ca::ensure(backend, spec).await,
            Resource::Certificate { spec, issuer_path } => {
                certificate::ensure(backend, spec, issuer_path).await
            }
            Resource::KeyPair(spec) => key_pair::ensure(backend, spec).await,
        }
    }

    /// Run `ensure` for every resource concurrently and wait for all of them.
    pub async fn reconcile_all(&self) -> PassReport {
        let mut tasks = JoinSet::new();
        for resource in self.resources.iter().cloned() {
            let controller = self.clone();
            let label = resource.lock_key();
            // The inner task isolates panics so the outer one can still name
            // the resource.
            tasks.spawn(async move {
                let outcome = tokio::spawn(async move { controller.ensure(&resource).await }).await;
                (label, outcome)
            });
        }

        let mut report = PassReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(Ok(())))) => report.succeeded += 1,
                Ok((label, Ok(Err(e)))) => {
                    error!(resource = %label, transient = e.is_transient(), error = %e, "Reconcile failed");
                    report.failed.push(label);
                }
                Ok((label, Err(e))) => {
                    error!(resource = %label, error = %e, "Reconcile task panicked");
                    report.failed.push(label);
                }
                Err(e) => error!(error = %e, "Reconcile task aborted"),
            }
        }
        report.failed.sort();
        report
    }

    /// Reconcile immediately and then every `interval` until `shutdown` is
    /// cancelled. An in-flight pass is allowed to finish.
    pub async fn run(&self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Controller stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let report = self.reconcile_all().await;
            if report.failed.is_empty() {
                info!(succeeded = report.succeeded, "Reconcile pass complete");
            } else {
                warn!(
                    succeeded = report.succeeded,
                    failed = report.failed.len(),
                    "Reconcile pass complete with failures"
                );
            }
        }
    }
}

/// Look up a stored certificate pair and decide whether it can be kept.
///
/// `Ok(Some(_))` when the pair parses and has at least `threshold` of
/// validity left; `Ok(None)` when it must be regenerated (absent, unparseable
/// or stale). Backend errors abort the attempt.
async fn valid_stored_certificate<B: SecretsBackend + ?Sized>(
    backend: &B,
    kind: &'static str,
    kv_path: &str,
    name: &str,
    threshold: Duration,
) -> Result<Option<CertificateArtifact>> {
    let stored = backend
        .get_secret(kv_path, name)
        .await
        .map_err(|e| Error::reconcile("look up stored certificate", name, e.into()))?;

    let Some(fields) = stored else {
        info!(kind, name, kv_path, "No stored certificate, generating");
        return Ok(None);
    };

    let location = format!("{}/{}", kv_path, name);
    let stored: StoredCertificate = match decode(&location, fields) {
        Ok(stored) => stored,
        Err(e) => {
            warn!(kind, name, error = %e, "Stored certificate is malformed, regenerating");
            return Ok(None);
        }
    };

    let artifact =
        match CertificateArtifact::parse(&stored.certificate, stored.private_key.expose_secret()) {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(kind, name, error = %e, "Stored certificate does not parse, regenerating");
                return Ok(None);
            }
        };

    let remaining = artifact.remaining();
    if remaining < threshold {
        warn!(
            kind,
            name,
            remaining_hours = remaining.as_secs() / 3600,
            threshold_hours = threshold.as_secs() / 3600,
            "Stored certificate is inside its renewal threshold, regenerating"
        );
        return Ok(None);
    }

    debug!(kind, name, remaining_hours = remaining.as_secs() / 3600, "Stored certificate is valid");
    Ok(Some(artifact))
}

/// Rewrite the host files from a valid stored artifact when the certificate
/// file is missing or differs.
fn sync_certificate_files(name: &str, host_path: &Path, artifact: &CertificateArtifact) -> Result<()> {
    let cert_path = store::with_suffix(host_path, ".pem");
    let key_path = store::with_suffix(host_path, "-key.pem");
    let on_disk = std::fs::read_to_string(&cert_path).ok();
    if on_disk.as_deref() == Some(artifact.certificate_pem.as_str()) && key_path.exists() {
        return Ok(());
    }

    info!(name, path = %host_path.display(), "Exporting stored certificate to host");
    store::store_certificate(
        host_path,
        &artifact.certificate_pem,
        artifact.private_key_pem.expose_secret(),
    )
    .map_err(|e| Error::reconcile("store certificate files", name, e))
}

/// Persist a freshly issued pair to KV and then to disk.
async fn persist_certificate<B: SecretsBackend + ?Sized>(
    backend: &B,
    name: &str,
    kv_path: &str,
    host_path: &Path,
    stored: &StoredCertificate,
) -> Result<()> {
    let data = crate::secrets::responses::encode(stored)?;
    backend
        .put_secret(kv_path, name, data)
        .await
        .map_err(|e| Error::reconcile("save certificate in KV", name, e.into()))?;

    store::store_certificate(host_path, &stored.certificate, stored.private_key.expose_secret())
        .map_err(|e| Error::reconcile("store certificate files", name, e))
}
