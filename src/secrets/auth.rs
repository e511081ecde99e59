//! Vault access-token lifecycle.
//!
//! [`TokenManager::authenticate`] installs a token into the shared
//! [`TokenStore`] and, for AppRole logins, starts a background task that logs
//! in again at half of the granted TTL.
//!
//! Credential resolution:
//! 1. both AppRole cache files present: log in with them directly;
//! 2. otherwise install the bootstrap token (static value, else token file),
//!    failing hard if neither exists;
//! 3. with the bootstrap token, fetch whichever of role id / secret id is not
//!    cached (the secret id is minted fresh), persist it, and log in.
//!
//! A failed renewal keeps the previous token and waits for the next tick.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::backend::{AppRoleLogin, Fields, SecretsBackend};
use super::error::{Result, SecretsError};
use super::responses::{decode, decode_required, RoleIdResponse, SecretIdResponse};
use super::token::{AccessToken, TokenStore};
use super::types::SecretString;
use crate::config::{AppRoleConfig, AuthConfig};
use crate::utils::files;

/// AppRole role id and secret id held in memory for renewals.
#[derive(Debug, Clone)]
pub struct AppRoleCredentials {
    pub role_id: SecretString,
    pub secret_id: SecretString,
}

/// Delay before the next login for a token granted `ttl`.
pub fn renewal_delay(ttl: Duration) -> Duration {
    ttl / 2
}

/// Authenticates the process against Vault and keeps it authenticated.
pub struct TokenManager<B> {
    backend: Arc<B>,
    tokens: Arc<TokenStore>,
    config: AuthConfig,
}

impl<B> TokenManager<B>
where
    B: SecretsBackend + AppRoleLogin + 'static,
{
    pub fn new(backend: Arc<B>, tokens: Arc<TokenStore>, config: AuthConfig) -> Self {
        Self { backend, tokens, config }
    }

    /// Install an initial token and start renewal when the token expires.
    ///
    /// Returns the renewal task, if one was started. The task stops when
    /// `shutdown` is cancelled.
    pub async fn authenticate(&self, shutdown: CancellationToken) -> Result<Option<JoinHandle<()>>> {
        let Some((approle, credentials)) = self.resolve_credentials().await? else {
            info!("No AppRole configured, using the bootstrap token without renewal");
            return Ok(None);
        };

        let token = self
            .backend
            .login(&approle.path, credentials.role_id.expose_secret(), credentials.secret_id.expose_secret())
            .await?;
        let ttl = token.ttl;
        let expires = token.expires();
        self.tokens.replace(token);
        info!(mount = %approle.path, role = %approle.name, ttl_secs = ttl.as_secs(), "Authenticated with AppRole");

        if !expires {
            return Ok(None);
        }

        let renewal = Renewal {
            backend: self.backend.clone(),
            tokens: self.tokens.clone(),
            mount: approle.path.clone(),
            credentials,
        };
        Ok(Some(tokio::spawn(renewal.run(ttl, shutdown))))
    }

    async fn resolve_credentials(&self) -> Result<Option<(&AppRoleConfig, AppRoleCredentials)>> {
        if let Some(approle) = &self.config.approle {
            let role_id = files::read_trimmed(&approle.role_id_local_path).await;
            let secret_id = files::read_trimmed(&approle.secret_id_local_path).await;
            if let (Some(role_id), Some(secret_id)) = (role_id, secret_id) {
                debug!("Using cached AppRole credentials");
                return Ok(Some((
                    approle,
                    AppRoleCredentials {
                        role_id: SecretString::new(role_id),
                        secret_id: SecretString::new(secret_id),
                    },
                )));
            }
        }

        let bootstrap = self.bootstrap_token().await?;
        self.tokens.replace(AccessToken::new(bootstrap, Duration::ZERO));

        let Some(approle) = &self.config.approle else {
            return Ok(None);
        };

        let role_id = self.role_id(approle).await.map_err(|e| {
            SecretsError::authentication_failed(format!("get role id: {}", e))
        })?;
        let secret_id = self.secret_id(approle).await.map_err(|e| {
            SecretsError::authentication_failed(format!("get secret id: {}", e))
        })?;
        Ok(Some((approle, AppRoleCredentials { role_id, secret_id })))
    }

    async fn bootstrap_token(&self) -> Result<SecretString> {
        let bootstrap = &self.config.bootstrap;
        if let Some(token) = bootstrap.token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(token.clone());
        }

        let Some(file) = &bootstrap.file else {
            return Err(SecretsError::authentication_failed(
                "no cached AppRole credentials, bootstrap token or bootstrap token file",
            ));
        };

        let contents = tokio::fs::read_to_string(file)
            .await
            .map_err(|e| SecretsError::io(file.display().to_string(), e))?;
        let token = contents.trim_end_matches('\n');
        if token.is_empty() {
            return Err(SecretsError::authentication_failed(format!(
                "bootstrap token file '{}' is empty",
                file.display()
            )));
        }
        Ok(SecretString::new(token))
    }

    async fn role_id(&self, approle: &AppRoleConfig) -> Result<SecretString> {
        if let Some(role_id) = files::read_trimmed(&approle.role_id_local_path).await {
            return Ok(SecretString::new(role_id));
        }

        let path = format!("auth/{}/role/{}/role-id", approle.path, approle.name);
        let fields = self
            .backend
            .read(&path)
            .await?
            .ok_or_else(|| SecretsError::not_found(format!("role_id at '{}'", path)))?;
        let RoleIdResponse { role_id } = decode(&path, fields)?;

        persist(&approle.role_id_local_path, &role_id)?;
        Ok(role_id)
    }

    async fn secret_id(&self, approle: &AppRoleConfig) -> Result<SecretString> {
        if let Some(secret_id) = files::read_trimmed(&approle.secret_id_local_path).await {
            return Ok(SecretString::new(secret_id));
        }

        let path = format!("auth/{}/role/{}/secret-id", approle.path, approle.name);
        let response = self.backend.write(&path, Fields::new()).await?;
        let SecretIdResponse { secret_id } = decode_required(&path, response)?;

        persist(&approle.secret_id_local_path, &secret_id)?;
        Ok(secret_id)
    }
}

fn persist(path: &Path, value: &SecretString) -> Result<()> {
    files::write_file(path, value.expose_secret().as_bytes(), files::PRIVATE_MODE)
        .map_err(|e| SecretsError::io(path.display().to_string(), e))?;
    debug!(path = %path.display(), "Cached AppRole credential");
    Ok(())
}

/// Background AppRole re-login.
struct Renewal<B> {
    backend: Arc<B>,
    tokens: Arc<TokenStore>,
    mount: String,
    credentials: AppRoleCredentials,
}

impl<B: AppRoleLogin> Renewal<B> {
    async fn run(self, ttl: Duration, shutdown: CancellationToken) {
        let mut delay = renewal_delay(ttl);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Token renewal stopped");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            let login = self.backend.login(
                &self.mount,
                self.credentials.role_id.expose_secret(),
                self.credentials.secret_id.expose_secret(),
            );
            match login.await {
                Ok(token) if token.expires() => {
                    delay = renewal_delay(token.ttl);
                    info!(ttl_secs = token.ttl.as_secs(), next_in_secs = delay.as_secs(), "Renewed Vault token");
                    self.tokens.replace(token);
                }
                Ok(token) => {
                    warn!("Renewed Vault token does not expire, stopping renewal");
                    self.tokens.replace(token);
                    return;
                }
                Err(e) => {
                    error!(
                        error = %e,
                        retry_in_secs = delay.as_secs(),
                        "Failed to renew Vault token, keeping the previous one"
                    );
                }
            }
        }
    }
}
