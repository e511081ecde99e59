//! HashiCorp Vault backend.
//!
//! Generic reads and writes go straight to the HTTP API (`/v1/<path>`) so the
//! PKI and AppRole endpoints keykeeper drives do not each need a bespoke
//! binding. AppRole login and the health check use `vaultrs`.
//!
//! Every request carries the token currently held by the shared
//! [`TokenStore`], loaded at send time, so a renewal is picked up by the very
//! next call. Every request is bounded by the configured timeout.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};

use super::backend::{AppRoleLogin, Fields, SecretsBackend};
use super::error::{Result, SecretsError};
use super::token::{AccessToken, TokenStore};
use crate::config::VaultConfig;

#[derive(Debug, Deserialize)]
struct DataEnvelope {
    #[serde(default)]
    data: Option<Fields>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<String>,
}

/// Vault client implementing [`SecretsBackend`] and [`AppRoleLogin`].
pub struct VaultBackend {
    http: reqwest::Client,
    login_client: VaultClient,
    address: String,
    namespace: Option<String>,
    timeout: Duration,
    tokens: Arc<TokenStore>,
}

impl std::fmt::Debug for VaultBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultBackend")
            .field("address", &self.address)
            .field("namespace", &self.namespace)
            .field("timeout", &self.timeout)
            .field("authenticated", &self.tokens.is_authenticated())
            .finish()
    }
}

impl VaultBackend {
    /// Build a client for `config`, reading tokens from `tokens`.
    ///
    /// No request is made here; call [`VaultBackend::health_check`] to check
    /// connectivity.
    pub fn new(config: &VaultConfig, tokens: Arc<TokenStore>) -> Result<Self> {
        if config.address.is_empty() {
            return Err(SecretsError::config_error("Vault address cannot be empty"));
        }
        let timeout = config.timeout();

        let http = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            SecretsError::config_error(format!("Failed to build HTTP client: {}", e))
        })?;

        let mut settings_builder = VaultClientSettingsBuilder::default();
        settings_builder.address(&config.address);
        if let Some(namespace) = &config.namespace {
            settings_builder.namespace(Some(namespace.clone()));
        }
        let settings = settings_builder.build().map_err(|e| {
            SecretsError::config_error(format!("Invalid Vault configuration: {}", e))
        })?;
        let login_client = VaultClient::new(settings).map_err(|e| {
            SecretsError::connection_failed(format!("Failed to create Vault client: {}", e))
        })?;

        Ok(Self {
            http,
            login_client,
            address: config.address.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone(),
            timeout,
            tokens,
        })
    }

    /// Query `sys/health`.
    pub async fn health_check(&self) -> Result<()> {
        match tokio::time::timeout(self.timeout, vaultrs::sys::health(&self.login_client)).await {
            Ok(Ok(_)) => {
                info!(address = %self.address, "Successfully connected to Vault");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(error = %e, address = %self.address, "Failed to connect to Vault");
                Err(SecretsError::connection_failed(format!("Vault health check failed: {}", e)))
            }
            Err(_) => Err(self.timeout_error("sys/health")),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/v1/{}", self.address, path.trim_start_matches('/'));
        let mut req = self.http.request(method, url);
        if let Some(token) = self.tokens.current() {
            req = req.header("X-Vault-Token", token.token.expose_secret());
        }
        if let Some(namespace) = &self.namespace {
            req = req.header("X-Vault-Namespace", namespace);
        }
        req
    }

    /// Send `req` and return the `data` block. A 404 yields `Ok(None)` when
    /// `missing_ok`, otherwise it is an error like any other status.
    async fn send(&self, path: &str, req: RequestBuilder, missing_ok: bool) -> Result<Option<Fields>> {
        let resp = req.send().await.map_err(|e| self.transport_error(path, e))?;
        let status = resp.status();
        debug!(path = %path, status = status.as_u16(), "Vault response");

        if status == StatusCode::NO_CONTENT || (status == StatusCode::NOT_FOUND && missing_ok) {
            return Ok(None);
        }

        if !status.is_success() {
            let errors = resp.json::<ErrorEnvelope>().await.unwrap_or_default().errors;
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(SecretsError::authentication_failed(format!(
                    "{} for '{}': {}",
                    status.as_u16(),
                    path,
                    errors.join("; ")
                )));
            }
            return Err(SecretsError::Status { path: path.to_string(), status: status.as_u16(), errors });
        }

        let envelope: DataEnvelope =
            resp.json().await.map_err(|e| SecretsError::decode(path, e.to_string()))?;
        Ok(envelope.data)
    }

    fn transport_error(&self, path: &str, err: reqwest::Error) -> SecretsError {
        if err.is_timeout() {
            self.timeout_error(path)
        } else if err.is_connect() {
            SecretsError::connection_failed(format!("{}: {}", path, err))
        } else {
            SecretsError::backend_error(format!("request to '{}' failed: {}", path, err))
        }
    }

    fn timeout_error(&self, path: &str) -> SecretsError {
        SecretsError::Timeout { path: path.to_string(), timeout_ms: self.timeout.as_millis() as u64 }
    }
}

fn kv_data_path(mount: &str, name: &str) -> String {
    format!("{}/data/{}", mount.trim_matches('/'), name.trim_start_matches('/'))
}

#[async_trait]
impl SecretsBackend for VaultBackend {
    async fn read(&self, path: &str) -> Result<Option<Fields>> {
        self.send(path, self.request(Method::GET, path), true).await
    }

    async fn write(&self, path: &str, data: Fields) -> Result<Option<Fields>> {
        let req = self.request(Method::POST, path).json(&Value::Object(data));
        self.send(path, req, false).await
    }

    async fn list(&self, path: &str) -> Result<Fields> {
        let req = self.request(Method::GET, path).query(&[("list", "true")]);
        Ok(self.send(path, req, true).await?.unwrap_or_default())
    }

    async fn put_secret(&self, mount: &str, name: &str, data: Fields) -> Result<()> {
        let path = kv_data_path(mount, name);
        let req = self.request(Method::POST, &path).json(&json!({ "data": data }));
        self.send(&path, req, false).await?;
        debug!(mount = %mount, name = %name, "Stored secret in Vault KV");
        Ok(())
    }

    async fn get_secret(&self, mount: &str, name: &str) -> Result<Option<Fields>> {
        let path = kv_data_path(mount, name);
        let Some(mut envelope) = self.send(&path, self.request(Method::GET, &path), true).await?
        else {
            return Ok(None);
        };
        match envelope.remove("data") {
            Some(Value::Object(data)) => Ok(Some(data)),
            Some(Value::Null) | None => Ok(None),
            Some(other) => Err(SecretsError::decode(
                path,
                format!("expected KV data to be an object, got {}", other),
            )),
        }
    }
}

#[async_trait]
impl AppRoleLogin for VaultBackend {
    async fn login(&self, mount: &str, role_id: &str, secret_id: &str) -> Result<AccessToken> {
        let path = format!("auth/{}/login", mount);
        let login = vaultrs::auth::approle::login(&self.login_client, mount, role_id, secret_id);
        let auth = tokio::time::timeout(self.timeout, login)
            .await
            .map_err(|_| self.timeout_error(&path))?
            .map_err(|e| {
                SecretsError::authentication_failed(format!("AppRole login at '{}': {}", path, e))
            })?;

        Ok(AccessToken::new(auth.client_token, Duration::from_secs(auth.lease_duration)))
    }
}
