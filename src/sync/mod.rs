//! Wiring between the CLI configuration and the offline queue.
//!
//! The queue itself lives in `haven-core`; this module builds it from
//! config, decides how connectivity is observed (an HTTP health probe),
//! and how notifications reach the terminal.

mod auto_sync;
mod client;
mod notifier;
mod probe;

pub use auto_sync::try_auto_sync;
pub use client::{open_queue, SyncClientError};
pub use notifier::ConsoleNotifier;
pub use probe::probe_once;
