use serde::Serialize;
use sha2::{Digest, Sha256};
use lvs_model::{Scheduler, Server, Service, ServiceType};

/// Borrowed view of a service with its servers in key order, so the
/// fingerprint ignores insertion order at both levels.
#[derive(Serialize)]
struct ServiceView<'a> {
    service_type: ServiceType,
    host: &'a str,
    port: u16,
    scheduler: Scheduler,
    persistence: u32,
    netmask: &'a str,
    servers: Vec<&'a Server>,
}

/// Computes a SHA-256 over the service table.
/// Services and their servers are sorted by key for deterministic output.
pub fn compute_fingerprint(services: &[Service]) -> String {
    let mut indices: Vec<usize> = (0..services.len()).collect();
    indices.sort_by(|&a, &b| {
        let (a, b) = (&services[a], &services[b]);
        (a.service_type, &a.host, a.port).cmp(&(b.service_type, &b.host, b.port))
    });

    let views: Vec<ServiceView<'_>> = indices
        .iter()
        .map(|&i| {
            let s = &services[i];
            let mut servers: Vec<&Server> = s.servers.iter().collect();
            servers.sort_by(|a, b| (&a.host, a.port).cmp(&(&b.host, b.port)));
            ServiceView {
                service_type: s.service_type,
                host: &s.host,
                port: s.port,
                scheduler: s.scheduler,
                persistence: s.persistence,
                netmask: &s.netmask,
                servers,
            }
        })
        .collect();

    let json = serde_json::to_string(&views)
        .expect("Failed to serialize services for fingerprinting");

    let hash = Sha256::digest(json.as_bytes());
    hex::encode(hash)
}
