//! Sync CLI commands for delivering queued actions.

use std::sync::Arc;

use clap::{Args, Subcommand};

use haven_core::{DrainOutcome, DrainReport, SkipReason};

use crate::config::Config;
use crate::sync::{open_queue, probe_once, ConsoleNotifier, SyncClientError};

/// Deliver queued actions to the server
#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,
}

#[derive(Debug, Subcommand)]
enum SyncSubcommand {
    /// Show sync configuration and server status
    Status,
}

impl SyncCommand {
    pub fn run(&self, config: &Config) -> Result<(), SyncCommandError> {
        // Use tokio runtime for async operations
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| SyncCommandError::RuntimeError(e.to_string()))?;

        match &self.command {
            None => rt.block_on(self.sync(config)),
            Some(SyncSubcommand::Status) => rt.block_on(self.status(config)),
        }
    }

    async fn sync(&self, config: &Config) -> Result<(), SyncCommandError> {
        let url = config
            .sync
            .server_url
            .as_ref()
            .ok_or(SyncClientError::NotConfigured)?;
        let queue = open_queue(config, Arc::new(ConsoleNotifier))?;

        if queue.is_empty() {
            println!("Nothing to sync.");
            return Ok(());
        }

        if !probe_once(queue.connectivity(), url).await {
            println!(
                "Server unreachable. {} item(s) remain queued.",
                queue.len()
            );
            return Ok(());
        }

        println!("Syncing with server...");
        println!();

        let outcome = queue
            .drain()
            .await
            .map_err(|e| SyncCommandError::StoreError(e.to_string()))?;

        match outcome {
            DrainOutcome::Completed(report) => print_report(&report),
            DrainOutcome::Discarded(report) => {
                print_report(&report);
                println!("Queue was cleared during sync.");
            }
            DrainOutcome::Skipped(reason) => println!("Sync skipped: {}", skip_reason(reason)),
        }

        let remaining = queue.len();
        if remaining > 0 {
            println!();
            println!("{} item(s) still queued.", remaining);
        }

        Ok(())
    }

    async fn status(&self, config: &Config) -> Result<(), SyncCommandError> {
        println!("Sync Configuration");
        println!("==================");
        println!();

        let queue = open_queue(config, Arc::new(ConsoleNotifier))?;
        println!("Pending:   {}", queue.len());

        let url = match config.sync.server_url.as_ref() {
            Some(url) => url,
            None => {
                println!("Status:    Not configured");
                println!();
                println!("To enable sync, add to your config file:");
                println!();
                println!("  sync:");
                println!("    server_url: \"https://api.example.com\"");
                println!("    api_token: \"...\"");
                println!();
                println!("Or set environment variables:");
                println!("  HAVEN_SERVER_URL, HAVEN_API_TOKEN");
                return Ok(());
            }
        };

        println!("Server:    {}", url);
        println!(
            "Token:     {}",
            if config.sync.api_token.is_some() {
                "set"
            } else {
                "missing"
            }
        );
        println!(
            "Auto-sync: {}",
            if config.sync.auto_sync {
                "enabled"
            } else {
                "disabled"
            }
        );
        println!();

        print!("Server status: ");
        if probe_once(queue.connectivity(), url).await {
            println!("✓ reachable");
        } else {
            println!("✗ unreachable");
        }

        Ok(())
    }
}

fn print_report(report: &DrainReport) {
    println!("  ✓ delivered  {}", report.succeeded);
    if report.retried > 0 {
        println!("  ↻ retrying   {}", report.retried);
    }
    if report.abandoned > 0 {
        println!("  ✗ abandoned  {}", report.abandoned);
    }
    if report.deferred > 0 {
        println!("  … deferred   {}", report.deferred);
    }
}

fn skip_reason(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::Offline => "offline",
        SkipReason::Empty => "queue is empty",
        SkipReason::InProgress => "another sync is running",
        SkipReason::Backoff => "waiting after recent failures",
    }
}

/// Errors from sync commands
#[derive(Debug)]
pub enum SyncCommandError {
    SyncError(SyncClientError),
    StoreError(String),
    RuntimeError(String),
}

impl std::fmt::Display for SyncCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncCommandError::SyncError(e) => write!(f, "{}", e),
            SyncCommandError::StoreError(e) => write!(f, "Failed to save queue: {}", e),
            SyncCommandError::RuntimeError(e) => write!(f, "Runtime error: {}", e),
        }
    }
}

impl std::error::Error for SyncCommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncCommandError::SyncError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SyncClientError> for SyncCommandError {
    fn from(e: SyncClientError) -> Self {
        SyncCommandError::SyncError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_reason_text() {
        assert_eq!(skip_reason(SkipReason::Empty), "queue is empty");
        assert_eq!(skip_reason(SkipReason::Offline), "offline");
    }
}
