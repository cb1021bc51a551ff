//! Long-running sync: watch connectivity and drain whenever possible.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;

use haven_core::SyncQueue;

use crate::config::Config;
use crate::sync::{open_queue, probe_once, ConsoleNotifier, SyncClientError};

/// Watch connectivity and sync queued actions as soon as the server is reachable
#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Seconds between connectivity probes (default from config)
    #[arg(long, short)]
    interval: Option<u64>,
}

impl WatchCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let url = config
            .sync
            .server_url
            .clone()
            .ok_or(SyncClientError::NotConfigured)?;
        let interval = Duration::from_secs(
            self.interval
                .unwrap_or(config.sync.poll_interval_secs)
                .max(1),
        );

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let queue = open_queue(config, Arc::new(ConsoleNotifier))?;
            let listener = queue.spawn_connectivity_listener();

            println!(
                "Watching {} every {}s ({} pending). Press Ctrl-C to stop.",
                url,
                interval.as_secs(),
                queue.len()
            );

            let mut ticker = tokio::time::interval(interval);
            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            loop {
                tokio::select! {
                    _ = &mut ctrl_c => break,
                    _ = ticker.tick() => {
                        poll(&queue, &url).await;
                    }
                }
            }

            listener.abort();
            println!("Stopped. {} item(s) pending.", queue.len());
            Ok::<(), Box<dyn std::error::Error>>(())
        })
    }
}

/// Probes the server once and returns whether it is reachable.
///
/// Transitions are handled by the connectivity listener; a steady online
/// state retries whatever is still queued.
async fn poll(queue: &SyncQueue, url: &str) -> bool {
    let was_online = queue.connectivity().is_online();
    let online = probe_once(queue.connectivity(), url).await;

    if online && was_online && !queue.is_empty() {
        if let Err(e) = queue.drain().await {
            tracing::error!("Failed to save queue: {}", e);
        }
    }
    online
}
