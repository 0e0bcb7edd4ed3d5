//! Seams between the session controller and the hosted services.

use crate::{AccountCreation, AuthEvent, AuthResult, Role, Session};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Capacity of the session-change bus. Slow subscribers skip old events.
const EVENT_CAPACITY: usize = 64;

/// Hosted identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current session, refreshed if needed. `Ok(None)` when signed out.
    async fn get_session(&self) -> AuthResult<Option<Session>>;

    /// Subscribe to session-change notifications.
    fn subscribe(&self) -> AuthSubscription;

    /// Sign in with email and password.
    async fn verify_credentials(&self, email: &str, password: &str) -> AuthResult<Session>;

    /// Create an account with email and password.
    async fn create_account(&self, email: &str, password: &str) -> AuthResult<AccountCreation>;

    /// End the hosted session.
    async fn terminate_session(&self) -> AuthResult<()>;
}

/// Role lookup table.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// Role for `user_id`, or `None` when no row exists.
    async fn lookup_role(&self, user_id: &str) -> AuthResult<Option<Role>>;
}

/// Fan-out bus for session-change notifications.
#[derive(Debug, Clone)]
pub struct AuthEventBus {
    tx: broadcast::Sender<AuthEvent>,
}

impl AuthEventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Deliver `event` to every current subscriber.
    pub fn emit(&self, event: AuthEvent) {
        let kind = event.kind;
        match self.tx.send(event) {
            Ok(receivers) => debug!(event = ?kind, receivers, "auth event emitted"),
            Err(_) => debug!(event = ?kind, "auth event emitted with no subscribers"),
        }
    }

    pub fn subscribe(&self) -> AuthSubscription {
        AuthSubscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for AuthEventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for one subscriber of an [`AuthEventBus`].
#[derive(Debug)]
pub struct AuthSubscription {
    rx: broadcast::Receiver<AuthEvent>,
}

impl AuthSubscription {
    /// Next event, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<AuthEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "auth subscriber lagged, skipping events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Stop receiving events.
    pub fn unsubscribe(self) {
        debug!("auth subscription released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuthChangeEvent, Identity};
    use chrono::{Duration, Utc};

    fn session(id: &str) -> Session {
        Session {
            access_token: format!("access-{id}"),
            refresh_token: format!("refresh-{id}"),
            expires_at: Utc::now() + Duration::hours(1),
            identity: Identity {
                id: id.to_string(),
                email: format!("{id}@example.com"),
            },
        }
    }

    #[tokio::test]
    async fn test_bus_delivers_to_all_subscribers() {
        let bus = AuthEventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.emit(AuthEvent::new(AuthChangeEvent::SignedIn, Some(session("u1"))));

        let ev_a = a.recv().await.unwrap();
        let ev_b = b.recv().await.unwrap();
        assert_eq!(ev_a.kind, AuthChangeEvent::SignedIn);
        assert_eq!(ev_b.session.unwrap().identity.id, "u1");
    }

    #[tokio::test]
    async fn test_unsubscribe_drops_receiver() {
        let bus = AuthEventBus::new();
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(bus.subscriber_count(), 0);

        // Emitting without subscribers is not an error.
        bus.emit(AuthEvent::new(AuthChangeEvent::SignedOut, None));
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_bus_dropped() {
        let bus = AuthEventBus::new();
        let mut sub = bus.subscribe();
        drop(bus);

        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber_keeps_receiving() {
        let bus = AuthEventBus::new();
        let mut sub = bus.subscribe();

        for _ in 0..(EVENT_CAPACITY + 5) {
            bus.emit(AuthEvent::new(AuthChangeEvent::TokenRefreshed, None));
        }
        bus.emit(AuthEvent::new(AuthChangeEvent::SignedOut, None));

        let mut last = None;
        for _ in 0..EVENT_CAPACITY {
            last = sub.recv().await.map(|e| e.kind);
        }
        assert_eq!(last, Some(AuthChangeEvent::SignedOut));
    }
}
