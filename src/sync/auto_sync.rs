//! Auto-sync after queueing an action.
//!
//! When `auto_sync` is enabled, commands that add to the queue try to
//! deliver it right away instead of waiting for `haven sync` or `haven watch`.

use haven_core::SyncQueue;

use crate::config::Config;
use crate::sync::probe_once;

/// Performs a drain if auto_sync is enabled and the server is reachable.
///
/// Any errors are reported but never fail the command: the item is already
/// safely queued and will be delivered later.
pub fn try_auto_sync(config: &Config, queue: &SyncQueue) {
    if !config.sync.auto_sync {
        return;
    }
    let url = match config.sync.server_url.as_ref() {
        Some(url) => url,
        None => return,
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(_) => return,
    };

    rt.block_on(async {
        // Check server reachability first (fast fail)
        if !probe_once(queue.connectivity(), url).await {
            eprintln!("Auto-sync: server unreachable, item stays queued");
            return;
        }

        if let Err(e) = queue.drain().await {
            eprintln!("Auto-sync: {}", e);
        }
    });
}
