use chrono::Utc;
use futures::future::join_all;
use shared::types::{HostCandidate, ReachabilityMatrix, Service, StatusResponse};
use crate::config::Catalog;
use crate::discovery::resolver::AddressResolver;
use crate::probe::Prober;

/// Discovers addresses, probes every candidate × service pair and
/// assembles the response. Always succeeds with best-effort data.
pub async fn build_status(
    catalog: &Catalog,
    resolver: &dyn AddressResolver,
    prober: &Prober,
) -> StatusResponse {
    let ips = resolver.discover().await;
    let candidates = HostCandidate::from_addresses(&ips);
    let results = probe_matrix(&candidates, &catalog.services, prober).await;

    StatusResponse {
        success: true,
        updated_at: Utc::now(),
        ips,
        services: catalog.services.clone(),
        results,
        meta: catalog.meta.clone(),
    }
}

/// Probes run concurrently; the matrix keeps candidate and service order.
pub async fn probe_matrix(
    candidates: &[HostCandidate],
    services: &[Service],
    prober: &Prober,
) -> ReachabilityMatrix {
    let probes = candidates.iter().flat_map(move |candidate| {
        services.iter().map(move |service| async move {
            let ok = prober.probe(&candidate.address, service.port).await;
            (candidate, service, ok)
        })
    });
    let outcomes = join_all(probes).await;

    let mut matrix = ReachabilityMatrix::new();
    for candidate in candidates {
        matrix.insert_candidate(candidate.key);
    }
    for (candidate, service, ok) in outcomes {
        tracing::debug!(
            "{} ({}) {}:{} -> {}",
            candidate.label,
            candidate.address,
            service.key,
            service.port,
            if ok { "up" } else { "down" }
        );
        matrix.record(candidate.key, &service.key, ok);
    }

    matrix
}
