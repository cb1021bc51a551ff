//! Edge-triggered connectivity tracking.
//!
//! The monitor does not detect reachability itself. Something platform
//! specific (a probe, an OS signal) reports the current state through
//! [`ConnectivityMonitor::set_online`], and subscribers only hear about
//! actual transitions.

use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;

/// Capacity of the event channel; subscribers lagging further behind miss edges.
const EVENT_CAPACITY: usize = 16;

/// A transition of the connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    BecameOnline,
    BecameOffline,
}

#[derive(Debug)]
pub struct ConnectivityMonitor {
    /// Guards the state and the send together so events go out in the
    /// order the state changed.
    online: Mutex<bool>,
    events: broadcast::Sender<ConnectivityEvent>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            online: Mutex::new(initially_online),
            events,
        }
    }

    fn state(&self) -> MutexGuard<'_, bool> {
        self.online
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_online(&self) -> bool {
        *self.state()
    }

    /// Records the current connectivity state.
    ///
    /// Returns the event that was emitted, or `None` if the state did not
    /// change. Concurrent reports emit their events in the order the state
    /// changed, so the last event always matches [`is_online`](Self::is_online).
    pub fn set_online(&self, online: bool) -> Option<ConnectivityEvent> {
        let mut current = self.state();
        if *current == online {
            return None;
        }
        *current = online;

        let event = if online {
            tracing::info!("Connectivity: online");
            ConnectivityEvent::BecameOnline
        } else {
            tracing::warn!("Connectivity: offline");
            ConnectivityEvent::BecameOffline
        };

        // No subscribers is fine
        let _ = self.events.send(event);
        Some(event)
    }

    /// Subscribes to future transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
