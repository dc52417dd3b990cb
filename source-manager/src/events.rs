//! Registry change notifications

use tokio::sync::broadcast;
use tracing::trace;

const CHANNEL_CAPACITY: usize = 64;

/// What changed in the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A source was installed or replaced
    Installed { id: String },

    /// A single source was removed
    Removed { id: String },

    /// Every installed source was removed
    Cleared,
}

impl RegistryEvent {
    /// Id of the affected source, if the event concerns a single one
    pub fn id(&self) -> Option<&str> {
        match self {
            RegistryEvent::Installed { id } | RegistryEvent::Removed { id } => Some(id),
            RegistryEvent::Cleared => None,
        }
    }
}

/// Broadcasts [`RegistryEvent`]s to any number of subscribers.
///
/// Publishing never blocks. A subscriber that falls more than the channel
/// capacity behind receives `RecvError::Lagged` and should rescan.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<RegistryEvent>,
}

impl ChangeNotifier {
    /// Create a new notifier with no subscribers
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Start receiving events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: RegistryEvent) {
        let receivers = self.sender.send(event.clone()).unwrap_or(0);
        trace!(?event, receivers, "registry event published");
    }

    /// Number of live receivers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_publish_without_subscribers() {
        let notifier = ChangeNotifier::new();
        notifier.publish(RegistryEvent::Cleared);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn test_every_subscriber_sees_event() {
        let notifier = ChangeNotifier::new();
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();

        notifier.publish(RegistryEvent::Installed { id: "x".to_string() });

        for rx in [&mut a, &mut b] {
            let event = rx.try_recv().unwrap();
            assert_eq!(event.id(), Some("x"));
            assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        }
    }

    #[test]
    fn test_late_subscriber_misses_earlier_events() {
        let notifier = ChangeNotifier::new();
        notifier.publish(RegistryEvent::Removed { id: "y".to_string() });

        let mut rx = notifier.subscribe();
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }
}
