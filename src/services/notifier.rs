// src/services/notifier.rs
// DOCUMENTATION: User-facing toast collaborator
// PURPOSE: One message when the widget cannot be activated

/// Toast/notification sink owned by the host page
pub trait Notifier: Send + Sync {
    fn notify_error(&self, message: &str);
}

/// Writes notifications to the log; used when no UI is attached
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_error(&self, message: &str) {
        log::error!("{}", message);
    }
}
