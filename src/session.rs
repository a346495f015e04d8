//! Session Provider
//!
//! Authentication itself happens elsewhere; the client only needs the current
//! bearer token and to hear about sign-in / sign-out. Both come through the
//! `SessionProvider` trait so the controller never reaches for global state.
//!
//! Change notifications are delivered over a `tokio::sync::watch` channel.
//! A `SessionSubscription` unsubscribes when dropped.

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::watch;
use tracing::info;

use crate::error::ClientError;

/// An authenticated session
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: SecretString,
}

impl Session {
    pub fn new(access_token: SecretString) -> Self {
        Self { access_token }
    }
}

/// Supplies the current session and notifies about changes
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Current session, `None` while unresolved or signed out
    async fn session(&self) -> Option<Session>;

    /// Subscribe to session changes
    fn subscribe(&self) -> SessionSubscription;

    /// End the current session
    async fn sign_out(&self) -> Result<(), ClientError>;
}

/// Handle on the session-change channel
pub struct SessionSubscription {
    rx: watch::Receiver<Option<Session>>,
}

impl SessionSubscription {
    pub fn new(rx: watch::Receiver<Option<Session>>) -> Self {
        Self { rx }
    }

    /// Wait for the next change.
    ///
    /// Returns `None` once the provider is gone; otherwise the new session
    /// (`Some(None)` means signed out).
    pub async fn changed(&mut self) -> Option<Option<Session>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Session as of the last observed change
    pub fn current(&self) -> Option<Session> {
        self.rx.borrow().clone()
    }

    /// Stop listening. Same as dropping the subscription.
    pub fn unsubscribe(self) {}
}

/// In-process session holding a token handed over by whoever performed the login
pub struct TokenSession {
    tx: watch::Sender<Option<Session>>,
}

impl TokenSession {
    pub fn new(token: Option<SecretString>) -> Self {
        let (tx, _rx) = watch::channel(token.map(Session::new));
        Self { tx }
    }

    pub fn signed_out() -> Self {
        Self::new(None)
    }

    /// Install a fresh token (login or token refresh)
    pub fn set_token(&self, token: SecretString) {
        self.tx.send_replace(Some(Session::new(token)));
        info!("Session token updated");
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl SessionProvider for TokenSession {
    async fn session(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> SessionSubscription {
        SessionSubscription::new(self.tx.subscribe())
    }

    async fn sign_out(&self) -> Result<(), ClientError> {
        if self.tx.send_replace(None).is_some() {
            info!("Signed out");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn token(raw: &str) -> SecretString {
        SecretString::from(raw.to_string())
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let provider = TokenSession::signed_out();
        assert!(provider.session().await.is_none());

        provider.set_token(token("t1"));
        let session = provider.session().await.unwrap();
        assert_eq!(session.access_token.expose_secret(), "t1");

        provider.sign_out().await.unwrap();
        assert!(provider.session().await.is_none());
    }

    #[tokio::test]
    async fn test_subscription_sees_changes() {
        let provider = TokenSession::new(Some(token("t1")));
        let mut sub = provider.subscribe();
        assert!(sub.current().is_some());

        provider.set_token(token("t2"));
        let next = sub.changed().await.unwrap().unwrap();
        assert_eq!(next.access_token.expose_secret(), "t2");

        provider.sign_out().await.unwrap();
        assert!(sub.changed().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_on_drop() {
        let provider = TokenSession::signed_out();
        let first = provider.subscribe();
        let second = provider.subscribe();
        assert_eq!(provider.subscriber_count(), 2);

        drop(first);
        assert_eq!(provider.subscriber_count(), 1);
        second.unsubscribe();
        assert_eq!(provider.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscription_ends_with_provider() {
        let provider = TokenSession::signed_out();
        let mut sub = provider.subscribe();
        drop(provider);
        assert!(sub.changed().await.is_none());
    }
}
