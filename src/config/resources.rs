//! Resource definitions: the CA hierarchy, leaf certificates and raw key pairs
//! the controller keeps alive.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

fn default_ttl() -> String {
    "8760h".to_string()
}

fn default_renewal_threshold_hours() -> u64 {
    // 30 days
    720
}

fn default_key_size() -> usize {
    2048
}

fn hours(h: u64) -> Duration {
    Duration::from_secs(h.saturating_mul(3600))
}

/// Parse a Vault TTL: plain seconds or a count with one of the `s`, `m`, `h`
/// or `d` suffixes (`8760h`, `30d`).
pub fn parse_ttl(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let unit = value.chars().last()?;
    let quantity: u64 = value[..value.len() - unit.len_utf8()].parse().ok()?;
    let scale = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3_600,
        'd' => 86_400,
        _ => return None,
    };
    quantity.checked_mul(scale).map(Duration::from_secs)
}

/// Everything the controller reconciles
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Resources {
    #[serde(default)]
    #[validate(nested)]
    pub root_cas: Vec<RootCaSpec>,

    #[serde(default)]
    #[validate(nested)]
    pub intermediate_cas: Vec<CaSpec>,

    #[serde(default)]
    #[validate(nested)]
    pub certificates: Vec<CertificateSpec>,

    #[serde(default)]
    #[validate(nested)]
    pub key_pairs: Vec<KeyPairSpec>,
}

impl Resources {
    /// Intermediate CA a certificate names as its issuer
    pub fn issuer(&self, name: &str) -> Option<&CaSpec> {
        self.intermediate_cas.iter().find(|ca| ca.name == name)
    }
}

/// Root CA generated inside a Vault PKI mount. The key never leaves Vault.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RootCaSpec {
    #[validate(length(min = 1, message = "Root CA name cannot be empty"))]
    pub name: String,

    #[validate(length(min = 1, message = "Common name cannot be empty"))]
    pub common_name: String,

    /// PKI mount holding the root
    #[validate(length(min = 1, message = "Root path cannot be empty"))]
    pub root_path: String,

    #[serde(default = "default_ttl")]
    pub ttl: String,

    #[serde(default = "default_renewal_threshold_hours")]
    #[validate(range(max = 876_000, message = "Renewal threshold must be at most 876000 hours"))]
    pub renewal_threshold_hours: u64,
}

impl RootCaSpec {
    pub fn renewal_threshold(&self) -> Duration {
        hours(self.renewal_threshold_hours)
    }
}

/// Intermediate CA generated in `ca_path` and signed by the root in `root_path`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CaSpec {
    #[validate(length(min = 1, message = "CA name cannot be empty"))]
    pub name: String,

    /// Base common name; the CA is issued as "<common_name> Intermediate Authority"
    #[validate(length(min = 1, message = "Common name cannot be empty"))]
    pub common_name: String,

    /// PKI mount generating the intermediate
    #[validate(length(min = 1, message = "CA path cannot be empty"))]
    pub ca_path: String,

    /// PKI mount of the signing root
    #[validate(length(min = 1, message = "Root path cannot be empty"))]
    pub root_path: String,

    /// KV v2 mount caching the certificate and key
    #[validate(length(min = 1, message = "KV path cannot be empty"))]
    pub kv_path: String,

    /// Files are written to `<host_path>.pem` and `<host_path>-key.pem`
    pub host_path: PathBuf,

    #[serde(default = "default_ttl")]
    pub ttl: String,

    #[serde(default = "default_renewal_threshold_hours")]
    #[validate(range(max = 876_000, message = "Renewal threshold must be at most 876000 hours"))]
    pub renewal_threshold_hours: u64,
}

impl CaSpec {
    pub fn renewal_threshold(&self) -> Duration {
        hours(self.renewal_threshold_hours)
    }

    pub fn intermediate_common_name(&self) -> String {
        format!("{} Intermediate Authority", self.common_name)
    }
}

/// Leaf certificate signed by an intermediate CA role
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CertificateSpec {
    #[validate(length(min = 1, message = "Certificate name cannot be empty"))]
    pub name: String,

    /// Name of the intermediate CA that signs this certificate
    #[validate(length(min = 1, message = "Issuer cannot be empty"))]
    pub issuer: String,

    /// PKI role on the issuer
    #[validate(length(min = 1, message = "Role cannot be empty"))]
    pub role: String,

    #[validate(length(min = 1, message = "KV path cannot be empty"))]
    pub kv_path: String,

    pub host_path: PathBuf,

    #[serde(default = "default_ttl")]
    pub ttl: String,

    #[serde(default = "default_renewal_threshold_hours")]
    #[validate(range(max = 876_000, message = "Renewal threshold must be at most 876000 hours"))]
    pub renewal_threshold_hours: u64,

    #[validate(nested)]
    pub spec: SubjectSpec,
}

impl CertificateSpec {
    pub fn renewal_threshold(&self) -> Duration {
        hours(self.renewal_threshold_hours)
    }

    #[cfg(test)]
    pub(crate) fn for_tests(name: &str) -> Self {
        Self {
            name: name.to_string(),
            issuer: "kubernetes".to_string(),
            role: "server".to_string(),
            kv_path: "secret".to_string(),
            host_path: PathBuf::from(format!("/etc/pki/{}", name)),
            ttl: default_ttl(),
            renewal_threshold_hours: default_renewal_threshold_hours(),
            spec: SubjectSpec {
                subject: Subject { common_name: name.to_string(), ..Default::default() },
                ip_addresses: IpAddressSources::default(),
                hostnames: Vec::new(),
                private_key: PrivateKeySpec::default(),
            },
        }
    }
}

/// Raw RSA key pair, e.g. a service-account signing key
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct KeyPairSpec {
    #[validate(length(min = 1, message = "Key pair name cannot be empty"))]
    pub name: String,

    #[validate(length(min = 1, message = "KV path cannot be empty"))]
    pub kv_path: String,

    /// Files are written to `<host_path>.pem` and `<host_path>.pub`
    pub host_path: PathBuf,

    #[serde(default = "default_key_size")]
    #[validate(range(min = 1024, max = 8192, message = "Key size must be between 1024 and 8192 bits"))]
    pub size: usize,
}

/// What goes into a certificate signing request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubjectSpec {
    #[validate(nested)]
    pub subject: Subject,

    #[serde(default)]
    pub ip_addresses: IpAddressSources,

    /// Encoded as URI SANs
    #[serde(default)]
    pub hostnames: Vec<String>,

    #[serde(default)]
    #[validate(nested)]
    pub private_key: PrivateKeySpec,
}

/// Distinguished name fields
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Subject {
    #[validate(length(min = 1, message = "Common name cannot be empty"))]
    pub common_name: String,

    #[serde(default)]
    pub country: Vec<String>,

    #[serde(default)]
    pub province: Vec<String>,

    #[serde(default)]
    pub locality: Vec<String>,

    #[serde(default)]
    pub organization: Vec<String>,

    #[serde(default)]
    pub organizational_unit: Vec<String>,

    #[serde(default)]
    pub street_address: Vec<String>,

    #[serde(default)]
    pub postal_code: Vec<String>,

    #[serde(default)]
    pub serial_number: Option<String>,
}

/// Where IP SANs come from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpAddressSources {
    /// Literal addresses
    #[serde(default, rename = "static")]
    pub static_ips: Vec<String>,

    /// Network interface names whose addresses are included
    #[serde(default)]
    pub interfaces: Vec<String>,

    /// Host names resolved at request time
    #[serde(default)]
    pub dns_lookup: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PrivateKeySpec {
    /// Vault PKI roles reject CSR keys below 2048 bits by default
    #[serde(default = "default_key_size")]
    #[validate(range(min = 2048, max = 8192, message = "Key size must be between 2048 and 8192 bits"))]
    pub size: usize,
}

impl Default for PrivateKeySpec {
    fn default() -> Self {
        Self { size: default_key_size() }
    }
}
