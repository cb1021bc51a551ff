use haven_core::{check_server, ConnectivityMonitor};

/// Probes the server once and records the result on the monitor.
///
/// Returns whether the server is reachable. A change of state is emitted
/// as a connectivity event by the monitor.
pub async fn probe_once(monitor: &ConnectivityMonitor, server_url: &str) -> bool {
    let reachable = check_server(server_url).await;
    tracing::debug!("Probe {}: reachable={}", server_url, reachable);
    monitor.set_online(reachable);
    reachable
}
