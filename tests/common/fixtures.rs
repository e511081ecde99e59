//! Certificate fixtures minted with rcgen.

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, CertificateSigningRequestParams, DnType,
    IsCa, KeyPair,
};
use std::time::Duration;
use time::OffsetDateTime;

pub const DAY: Duration = Duration::from_secs(24 * 3600);

fn validity(valid_for: Duration) -> (OffsetDateTime, OffsetDateTime) {
    let now = OffsetDateTime::now_utc();
    let not_after = now + time::Duration::try_from(valid_for).expect("validity fits");
    (now - time::Duration::hours(1), not_after)
}

/// A self-signed CA used to sign everything the in-memory Vault issues.
pub struct FixtureCa {
    cert: Certificate,
    key: KeyPair,
}

impl FixtureCa {
    pub fn new(common_name: &str) -> Self {
        let key = KeyPair::generate().expect("generate CA key");
        let cert = ca_params(common_name, 3650 * DAY).self_signed(&key).expect("self-sign CA");
        Self { cert, key }
    }

    pub fn pem(&self) -> String {
        self.cert.pem()
    }

    /// Sign a PEM CSR, valid for `valid_for` from now.
    pub fn sign_csr(&self, csr_pem: &str, valid_for: Duration) -> String {
        let mut csr = CertificateSigningRequestParams::from_pem(csr_pem).expect("parse CSR");
        let (not_before, not_after) = validity(valid_for);
        csr.params.not_before = not_before;
        csr.params.not_after = not_after;
        csr.signed_by(&self.cert, &self.key).expect("sign CSR").pem()
    }

    /// A leaf certificate and its PKCS#8 key, valid for `valid_for` from now.
    pub fn issue(&self, common_name: &str, valid_for: Duration) -> (String, String) {
        let key = KeyPair::generate().expect("generate leaf key");
        let mut params =
            CertificateParams::new(vec![common_name.to_string()]).expect("leaf params");
        params.distinguished_name.push(DnType::CommonName, common_name);
        let (not_before, not_after) = validity(valid_for);
        params.not_before = not_before;
        params.not_after = not_after;

        let cert = params.signed_by(&key, &self.cert, &self.key).expect("sign leaf");
        (cert.pem(), key.serialize_pem())
    }
}

fn ca_params(common_name: &str, valid_for: Duration) -> CertificateParams {
    let mut params = CertificateParams::default();
    params.distinguished_name.push(DnType::CommonName, common_name);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let (not_before, not_after) = validity(valid_for);
    params.not_before = not_before;
    params.not_after = not_after;
    params
}

/// A self-signed root CA certificate PEM.
pub fn root_certificate(common_name: &str, valid_for: Duration) -> String {
    let key = KeyPair::generate().expect("generate root key");
    ca_params(common_name, valid_for).self_signed(&key).expect("self-sign root").pem()
}

/// A CSR and the PKCS#8 key it was made with, as Vault's
/// `intermediate/generate/exported` returns them.
pub fn exported_csr(common_name: &str) -> (String, String) {
    let key = KeyPair::generate().expect("generate intermediate key");
    let mut params = CertificateParams::default();
    params.distinguished_name.push(DnType::CommonName, common_name);
    let csr = params.serialize_request(&key).expect("build CSR").pem().expect("encode CSR");
    (csr, key.serialize_pem())
}
