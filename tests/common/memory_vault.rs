//! In-memory stand-in for Vault.
//!
//! Records every call, emulates the PKI, AppRole and KV v2 endpoints the
//! reconciler drives, and lets tests inject failures.

use async_trait::async_trait;
use keykeeper::secrets::{
    fields, AccessToken, AppRoleLogin, Fields, SecretsBackend, SecretsError, TokenStore,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::fixtures::{self, FixtureCa, DAY};

type Result<T> = std::result::Result<T, SecretsError>;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Read(String),
    Write(String, Fields),
    List(String),
    Put { mount: String, name: String, data: Fields },
    Get { mount: String, name: String },
    Login { mount: String, role_id: String, secret_id: String },
}

impl Call {
    /// True for calls that change backend state.
    pub fn is_mutation(&self) -> bool {
        matches!(self, Call::Write(..) | Call::Put { .. })
    }
}

struct State {
    calls: Vec<Call>,
    tokens_seen: Vec<Option<String>>,
    reads: HashMap<String, Fields>,
    kv: HashMap<(String, String), Fields>,
    failing: HashSet<String>,
    logins: VecDeque<Result<AccessToken>>,
    login_ttl: Duration,
    issued_validity: Duration,
    issued: usize,
}

pub struct MemoryVault {
    ca: FixtureCa,
    tokens: Option<Arc<TokenStore>>,
    state: Mutex<State>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self {
            ca: FixtureCa::new("keykeeper test root"),
            tokens: None,
            state: Mutex::new(State {
                calls: Vec::new(),
                tokens_seen: Vec::new(),
                reads: HashMap::new(),
                kv: HashMap::new(),
                failing: HashSet::new(),
                logins: VecDeque::new(),
                login_ttl: Duration::from_secs(3600),
                issued_validity: 365 * DAY,
                issued: 0,
            }),
        }
    }

    /// Record the token held by `tokens` on every call.
    pub fn with_tokens(mut self, tokens: Arc<TokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn ca(&self) -> &FixtureCa {
        &self.ca
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    /// Paths of every `write`, in order.
    pub fn write_paths(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Write(path, _) => Some(path),
                _ => None,
            })
            .collect()
    }

    pub fn write_data(&self, path: &str) -> Option<Fields> {
        self.calls().into_iter().find_map(|call| match call {
            Call::Write(p, data) if p == path => Some(data),
            _ => None,
        })
    }

    /// Number of certificates signed by the emulated PKI.
    pub fn issued_count(&self) -> usize {
        self.state().issued
    }

    pub fn login_count(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::Login { .. })).count()
    }

    pub fn tokens_seen(&self) -> Vec<Option<String>> {
        self.state().tokens_seen.clone()
    }

    pub fn set_read(&self, path: &str, data: Fields) {
        self.state().reads.insert(path.to_string(), data);
    }

    pub fn set_secret(&self, mount: &str, name: &str, data: Fields) {
        self.state().kv.insert((mount.to_string(), name.to_string()), data);
    }

    pub fn secret(&self, mount: &str, name: &str) -> Option<Fields> {
        self.state().kv.get(&(mount.to_string(), name.to_string())).cloned()
    }

    /// Store a certificate pair in KV the way keykeeper does.
    pub fn store_certificate(&self, mount: &str, name: &str, certificate: &str, private_key: &str) {
        self.set_secret(
            mount,
            name,
            fields([("certificate", certificate), ("private_key", private_key)]),
        );
    }

    /// Every call whose path contains `fragment` fails.
    pub fn fail_path(&self, fragment: &str) {
        self.state().failing.insert(fragment.to_string());
    }

    pub fn heal(&self) {
        self.state().failing.clear();
    }

    /// Queue the result of the next AppRole login. Without queued results
    /// logins succeed with `token-<n>` and the configured TTL.
    pub fn queue_login(&self, result: Result<AccessToken>) {
        self.state().logins.push_back(result);
    }

    pub fn set_login_ttl(&self, ttl: Duration) {
        self.state().login_ttl = ttl;
    }

    /// Validity of certificates issued by the emulated PKI.
    pub fn set_issued_validity(&self, validity: Duration) {
        self.state().issued_validity = validity;
    }

    fn record(&self, path: &str, call: Call) -> Result<()> {
        let token = self
            .tokens
            .as_ref()
            .and_then(|t| t.current())
            .map(|t| t.token.expose_secret().to_string());

        let mut state = self.state();
        state.calls.push(call);
        state.tokens_seen.push(token);
        if state.failing.iter().any(|fragment| path.contains(fragment.as_str())) {
            return Err(SecretsError::Status {
                path: path.to_string(),
                status: 500,
                errors: vec!["injected failure".to_string()],
            });
        }
        Ok(())
    }

    fn pki_write(&self, path: &str, data: &Fields) -> Option<Fields> {
        let text = |key: &str| data.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string();

        if let Some(mount) = path.strip_suffix("/root/generate/internal") {
            let certificate = fixtures::root_certificate(&text("common_name"), 3650 * DAY);
            self.set_read(&format!("{}/cert/ca", mount), fields([("certificate", certificate.as_str())]));
            return Some(fields([("certificate", certificate)]));
        }

        if path.ends_with("/intermediate/generate/exported") {
            let (csr, private_key) = fixtures::exported_csr(&text("common_name"));
            return Some(fields([("csr", csr), ("private_key", private_key)]));
        }

        if path.ends_with("/root/sign-intermediate") || path.contains("/sign/") {
            let validity = {
                let mut state = self.state();
                state.issued += 1;
                state.issued_validity
            };
            let certificate = self.ca.sign_csr(&text("csr"), validity);
            return Some(fields([("certificate", certificate), ("issuing_ca", self.ca.pem())]));
        }

        if path.ends_with("/secret-id") {
            return Some(fields([("secret_id", "minted-secret-id")]));
        }

        None
    }
}

impl Default for MemoryVault {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretsBackend for MemoryVault {
    async fn read(&self, path: &str) -> Result<Option<Fields>> {
        self.record(path, Call::Read(path.to_string()))?;
        Ok(self.state().reads.get(path).cloned())
    }

    async fn write(&self, path: &str, data: Fields) -> Result<Option<Fields>> {
        self.record(path, Call::Write(path.to_string(), data.clone()))?;
        Ok(self.pki_write(path, &data))
    }

    async fn list(&self, path: &str) -> Result<Fields> {
        self.record(path, Call::List(path.to_string()))?;
        Ok(Fields::new())
    }

    async fn put_secret(&self, mount: &str, name: &str, data: Fields) -> Result<()> {
        let path = format!("{}/{}", mount, name);
        self.record(
            &path,
            Call::Put { mount: mount.to_string(), name: name.to_string(), data: data.clone() },
        )?;
        self.set_secret(mount, name, data);
        Ok(())
    }

    async fn get_secret(&self, mount: &str, name: &str) -> Result<Option<Fields>> {
        let path = format!("{}/{}", mount, name);
        self.record(&path, Call::Get { mount: mount.to_string(), name: name.to_string() })?;
        Ok(self.secret(mount, name))
    }
}

#[async_trait]
impl AppRoleLogin for MemoryVault {
    async fn login(&self, mount: &str, role_id: &str, secret_id: &str) -> Result<AccessToken> {
        let path = format!("auth/{}/login", mount);
        self.record(
            &path,
            Call::Login {
                mount: mount.to_string(),
                role_id: role_id.to_string(),
                secret_id: secret_id.to_string(),
            },
        )?;

        let mut state = self.state();
        if let Some(result) = state.logins.pop_front() {
            return result;
        }
        let n = state.calls.iter().filter(|c| matches!(c, Call::Login { .. })).count();
        Ok(AccessToken::new(format!("token-{}", n), state.login_ttl))
    }
}
