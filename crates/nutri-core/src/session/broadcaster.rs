//! Fan-out of session changes to registered listeners.

use super::account_service::SessionSubscription;
use super::model::SessionChange;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

type Listeners = HashMap<u64, mpsc::UnboundedSender<SessionChange>>;

/// Delivers each published change to every live subscription, in publish order.
///
/// Account service implementations embed one of these and hand out its
/// subscriptions from [`super::AccountService::subscribe`].
#[derive(Clone, Default)]
pub struct SessionBroadcaster {
    listeners: Arc<Mutex<Listeners>>,
    next_id: Arc<AtomicU64>,
}

impl SessionBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(listeners: &Mutex<Listeners>) -> MutexGuard<'_, Listeners> {
        listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a new listener.
    pub fn subscribe(&self) -> SessionSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Self::lock(&self.listeners).insert(id, tx);

        let listeners = Arc::clone(&self.listeners);
        SessionSubscription::new(rx, move || {
            Self::lock(&listeners).remove(&id);
            tracing::debug!(listener = id, "Session listener released");
        })
    }

    /// Sends `change` to all listeners, dropping those whose receiver is gone.
    pub fn publish(&self, change: SessionChange) {
        let mut listeners = Self::lock(&self.listeners);
        listeners.retain(|_, tx| tx.send(change.clone()).is_ok());
        tracing::debug!(
            kind = change.kind(),
            listeners = listeners.len(),
            "Published session change"
        );
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        Self::lock(&self.listeners).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;

    #[tokio::test]
    async fn test_publish_reaches_all_listeners_in_order() {
        let broadcaster = SessionBroadcaster::new();
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();

        broadcaster.publish(SessionChange::SignedIn(Session::new("u1", "a@b.c")));
        broadcaster.publish(SessionChange::SignedOut);

        for sub in [&mut first, &mut second] {
            assert_eq!(sub.next().await.unwrap().kind(), "signed_in");
            assert_eq!(sub.next().await.unwrap().kind(), "signed_out");
        }
    }

    #[test]
    fn test_dropping_subscription_unregisters() {
        let broadcaster = SessionBroadcaster::new();
        let sub = broadcaster.subscribe();
        let other = broadcaster.subscribe();
        assert_eq!(broadcaster.listener_count(), 2);

        sub.release();
        assert_eq!(broadcaster.listener_count(), 1);

        drop(other);
        assert_eq!(broadcaster.listener_count(), 0);
    }
}
