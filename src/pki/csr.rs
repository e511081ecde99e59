//! Certificate signing requests for leaf certificates.
//!
//! Every request gets a fresh RSA key. The PKCS#10 request is assembled with
//! `x509-cert`, signed with PKCS#1 v1.5 over SHA-256, and the key is written
//! out as PKCS#1 alongside the signed certificate.
//!
//! Every value of a multi-valued subject field becomes its own RDN, so a
//! subject with two organizations carries two `O` attributes.

use const_oid::db::{rfc4519, rfc5280, rfc5912};
use const_oid::ObjectIdentifier;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::EncodePublicKey;
use rsa::signature::{SignatureEncoding, Signer};
use sha2::Sha256;
use std::net::IpAddr;
use tracing::debug;
use x509_cert::attr::{Attribute, AttributeTypeAndValue};
use x509_cert::der::asn1::{Any, BitString, OctetString, PrintableStringRef, SetOfVec, Utf8StringRef};
use x509_cert::der::pem::LineEnding;
use x509_cert::der::{Decode, Encode, EncodePem};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::SubjectAltName;
use x509_cert::ext::Extension;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};
use x509_cert::request::{CertReq, CertReqInfo, Version};
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use super::error::{PkiError, Result};
use super::keys;
use super::san;
use crate::config::{Subject, SubjectSpec};
use crate::secrets::SecretString;

/// A PEM encoded CSR and the private key it was signed with.
#[derive(Debug, Clone)]
pub struct SigningRequest {
    pub csr_pem: String,
    pub private_key_pem: SecretString,
}

/// Build a signing request for `spec`, resolving its IP SANs first.
pub async fn build_csr(spec: &SubjectSpec) -> Result<SigningRequest> {
    let ips = san::resolve_ip_sans(&spec.ip_addresses).await;
    debug!(common_name = %spec.subject.common_name, ip_sans = ips.len(), "Resolved IP SANs");

    let spec = spec.clone();
    tokio::task::spawn_blocking(move || {
        let key = keys::generate_rsa(spec.private_key.size)?;
        sign_request(&spec, &ips, &key)
    })
    .await
    .map_err(|e| PkiError::csr_generation(format!("signing task failed: {}", e)))?
}

/// Build and sign a request for `spec` with `key` and pre-resolved `ips`.
pub fn sign_request(
    spec: &SubjectSpec,
    ips: &[IpAddr],
    key: &rsa::RsaPrivateKey,
) -> Result<SigningRequest> {
    let public_key = rsa::RsaPublicKey::from(key)
        .to_public_key_der()
        .map_err(|e| PkiError::csr_generation(format!("encode public key: {}", e)))?;
    let public_key = SubjectPublicKeyInfoOwned::from_der(public_key.as_bytes()).map_err(der_error)?;

    let mut names = Vec::with_capacity(ips.len() + spec.hostnames.len());
    for ip in ips {
        names.push(ip_san(ip)?);
    }
    names.extend(san::uri_sans(&spec.hostnames));

    let info = CertReqInfo {
        version: Version::V1,
        subject: distinguished_name(&spec.subject)?,
        public_key,
        attributes: extension_request(names)?,
    };

    let signing_key = SigningKey::<Sha256>::new(key.clone());
    let signature = signing_key
        .try_sign(&info.to_der().map_err(der_error)?)
        .map_err(|e| PkiError::csr_generation(format!("sign request: {}", e)))?;

    let request = CertReq {
        info,
        algorithm: AlgorithmIdentifierOwned {
            oid: rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
            parameters: Some(Any::null()),
        },
        signature: BitString::from_bytes(&signature.to_bytes()).map_err(der_error)?,
    };
    let csr_pem = request.to_pem(LineEnding::LF).map_err(der_error)?;

    Ok(SigningRequest { csr_pem, private_key_pem: keys::pkcs1_pem(key)? })
}

fn der_error(e: x509_cert::der::Error) -> PkiError {
    PkiError::csr_generation(e.to_string())
}

/// Subject in the conventional C, ST, L, STREET, postalCode, O, OU, CN,
/// serialNumber order, one RDN per value.
fn distinguished_name(subject: &Subject) -> Result<RdnSequence> {
    let mut rdns = Vec::new();

    // Country and serial number are PrintableString in RFC 5280.
    let fields: [(ObjectIdentifier, &[String], bool); 7] = [
        (rfc4519::C, &subject.country, true),
        (rfc4519::ST, &subject.province, false),
        (rfc4519::L, &subject.locality, false),
        (rfc4519::STREET, &subject.street_address, false),
        (rfc4519::POSTAL_CODE, &subject.postal_code, false),
        (rfc4519::O, &subject.organization, false),
        (rfc4519::OU, &subject.organizational_unit, false),
    ];
    for (oid, values, printable) in fields {
        for value in values {
            rdns.push(rdn(oid, value, printable)?);
        }
    }

    rdns.push(rdn(rfc4519::CN, &subject.common_name, false)?);
    if let Some(serial) = &subject.serial_number {
        rdns.push(rdn(rfc4519::SERIAL_NUMBER, serial, true)?);
    }

    Ok(RdnSequence(rdns))
}

fn rdn(oid: ObjectIdentifier, value: &str, printable: bool) -> Result<RelativeDistinguishedName> {
    let encoded = if printable {
        PrintableStringRef::new(value).and_then(|s| Any::encode_from(&s))
    } else {
        Utf8StringRef::new(value).and_then(|s| Any::encode_from(&s))
    }
    .map_err(|e| PkiError::csr_generation(format!("subject attribute {} '{}': {}", oid, value, e)))?;

    let mut set = SetOfVec::new();
    set.insert(AttributeTypeAndValue { oid, value: encoded }).map_err(der_error)?;
    Ok(RelativeDistinguishedName::from(set))
}

fn ip_san(ip: &IpAddr) -> Result<GeneralName> {
    let octets = match ip {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    };
    Ok(GeneralName::IpAddress(OctetString::new(octets).map_err(der_error)?))
}

/// PKCS#9 extensionRequest attribute carrying the SAN extension, empty when
/// there are no SANs.
fn extension_request(names: Vec<GeneralName>) -> Result<SetOfVec<Attribute>> {
    let mut attributes = SetOfVec::new();
    if names.is_empty() {
        return Ok(attributes);
    }

    let san = SubjectAltName(names).to_der().map_err(der_error)?;
    let extensions = vec![Extension {
        extn_id: rfc5280::ID_CE_SUBJECT_ALT_NAME,
        critical: false,
        extn_value: OctetString::new(san).map_err(der_error)?,
    }];

    let mut values = SetOfVec::new();
    values.insert(Any::encode_from(&extensions).map_err(der_error)?).map_err(der_error)?;
    attributes
        .insert(Attribute { oid: rfc5912::ID_EXTENSION_REQ, values })
        .map_err(der_error)?;
    Ok(attributes)
}
