//! Authentication-changed signal

use crate::types::UserProfile;
use tokio::sync::broadcast;
use tracing::trace;

const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    LoggedIn(UserProfile),
    Registered(UserProfile),
    LoggedOut,
    /// The HTTP client gave up on refreshing and cleared the stored session
    SessionExpired,
}

/// Publish/subscribe bus for [`AuthEvent`]s
///
/// Cloning yields another handle onto the same bus.
#[derive(Debug, Clone)]
pub struct AuthEvents {
    sender: broadcast::Sender<AuthEvent>,
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Deliver `event` to current subscribers. Having none is not an error.
    pub fn emit(&self, event: AuthEvent) {
        let delivered = self.sender.send(event).unwrap_or(0);
        trace!(delivered, "auth event emitted");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_see_events_in_order() {
        let events = AuthEvents::new();
        let mut rx = events.subscribe();

        events.emit(AuthEvent::LoggedIn(UserProfile::new("bob")));
        events.emit(AuthEvent::LoggedOut);

        assert_eq!(
            rx.recv().await.unwrap(),
            AuthEvent::LoggedIn(UserProfile::new("bob"))
        );
        assert_eq!(rx.recv().await.unwrap(), AuthEvent::LoggedOut);
    }

    #[test]
    fn test_emit_without_subscribers() {
        AuthEvents::new().emit(AuthEvent::LoggedOut);
    }
}
