//! User-facing notifications raised by the queue.
//!
//! The queue never renders anything itself; it hands [`Notification`]s to
//! whatever [`Notifier`] the application wired in.

use std::fmt;

use crate::models::SyncKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A drain delivered `count` items.
    Synced { count: usize },
    /// Connectivity was lost.
    Offline,
    /// Connectivity came back and a drain is starting.
    Restored,
    /// An item was dropped after exhausting its attempts.
    Abandoned {
        item_id: String,
        kind: SyncKind,
        attempts: u32,
    },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Synced { count } => {
                write!(f, "Synced {} item{}", count, if *count == 1 { "" } else { "s" })
            }
            Notification::Offline => write!(
                f,
                "You are offline. Changes will sync when connection returns."
            ),
            Notification::Restored => write!(f, "Connection restored. Syncing pending changes."),
            Notification::Abandoned {
                item_id,
                kind,
                attempts,
            } => write!(
                f,
                "Could not deliver {} {} after {} attempt{}",
                kind,
                item_id,
                attempts,
                if *attempts == 1 { "" } else { "s" }
            ),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Notifier that only writes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match &notification {
            Notification::Abandoned { .. } | Notification::Offline => {
                tracing::warn!("{}", notification)
            }
            _ => tracing::info!("{}", notification),
        }
    }
}
