//! Subject alternative names for signing requests.
//!
//! IP SANs merge three sources: static literals, addresses bound to named
//! interfaces, and DNS lookups. Results are deduplicated by their textual form.
//! A source that cannot be resolved is skipped with a warning; the request is
//! still built from whatever did resolve.

use std::collections::BTreeMap;
use std::net::IpAddr;
use tracing::{debug, warn};
use x509_cert::der::asn1::Ia5String;
use x509_cert::ext::pkix::name::GeneralName;

use crate::config::IpAddressSources;

/// Resolve every configured IP source into a deduplicated address list.
pub async fn resolve_ip_sans(sources: &IpAddressSources) -> Vec<IpAddr> {
    let mut found = BTreeMap::new();

    collect_static(&sources.static_ips, &mut found);

    if !sources.interfaces.is_empty() {
        match if_addrs::get_if_addrs() {
            Ok(ifaces) => {
                let bound: Vec<(String, IpAddr)> =
                    ifaces.iter().map(|iface| (iface.name.clone(), iface.ip())).collect();
                collect_interfaces(&sources.interfaces, &bound, &mut found);
            }
            Err(e) => warn!(error = %e, "Failed to list network interfaces, skipping interface SANs"),
        }
    }

    for name in &sources.dns_lookup {
        match tokio::net::lookup_host((name.as_str(), 0)).await {
            Ok(addrs) => {
                for addr in addrs {
                    insert(&mut found, addr.ip());
                }
            }
            Err(e) => warn!(host = %name, error = %e, "DNS lookup failed, skipping"),
        }
    }

    found.into_values().collect()
}

fn insert(found: &mut BTreeMap<String, IpAddr>, ip: IpAddr) {
    found.entry(ip.to_string()).or_insert(ip);
}

fn collect_static(literals: &[String], found: &mut BTreeMap<String, IpAddr>) {
    for literal in literals {
        match literal.trim().parse::<IpAddr>() {
            Ok(ip) => insert(found, ip),
            Err(e) => warn!(ip = %literal, error = %e, "Invalid static IP address, skipping"),
        }
    }
}

/// `bound` is the (interface name, address) list of the host.
fn collect_interfaces(
    wanted: &[String],
    bound: &[(String, IpAddr)],
    found: &mut BTreeMap<String, IpAddr>,
) {
    for name in wanted {
        let mut matched = false;
        for (iface, ip) in bound.iter().filter(|(iface, _)| iface == name) {
            debug!(interface = %iface, ip = %ip, "Adding interface address");
            insert(found, *ip);
            matched = true;
        }
        if !matched {
            warn!(interface = %name, "Interface not found or has no addresses, skipping");
        }
    }
}

/// Hostnames as URI SANs. Values are not checked for resolvability; values
/// that are not IA5 strings are skipped.
pub fn uri_sans(hostnames: &[String]) -> Vec<GeneralName> {
    hostnames
        .iter()
        .filter_map(|hostname| match Ia5String::new(hostname) {
            Ok(uri) => Some(GeneralName::UniformResourceIdentifier(uri)),
            Err(e) => {
                warn!(hostname = %hostname, error = %e, "Hostname is not a valid URI SAN, skipping");
                None
            }
        })
        .collect()
}
