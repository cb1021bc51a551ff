use haven_core::{Notification, Notifier};

/// Prints notifications to stderr so stdout stays machine readable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        tracing::debug!("notification: {:?}", notification);
        match notification {
            Notification::Abandoned { .. } => eprintln!("✗ {}", notification),
            Notification::Offline => eprintln!("⚠ {}", notification),
            _ => eprintln!("✓ {}", notification),
        }
    }
}
