//! Subscription Handles
//!
//! Jede Komponente, die auf einen Stream des Anrufs hört, bekommt ein
//! Handle zurück. Wird das Handle gedroppt, endet der Listener-Task.

use std::future::Future;
use tokio::task::JoinHandle;

/// Ein laufender Listener auf einem Stream
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Startet einen Listener-Task
    ///
    /// Muss innerhalb einer tokio Runtime aufgerufen werden.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }

    /// Läuft der Listener noch?
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Sammlung von Subscriptions mit gemeinsamer Lebensdauer
#[derive(Debug, Default)]
pub struct Lifetime {
    subscriptions: Vec<Subscription>,
}

impl Lifetime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    /// Übernimmt alle Subscriptions einer anderen Lifetime
    pub fn extend(&mut self, other: Lifetime) {
        let mut other = other;
        self.subscriptions.append(&mut other.subscriptions);
    }

    /// Beendet alle Listener
    pub fn destroy(&mut self) {
        self.subscriptions.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_drop_aborts_listener() {
        let (tx, rx) = oneshot::channel::<()>();

        let subscription = Subscription::spawn(async move {
            // tx wird erst beim Abbruch gedroppt
            let _keep = tx;
            std::future::pending::<()>().await;
        });
        assert!(subscription.is_active());

        drop(subscription);

        let result = tokio::time::timeout(Duration::from_secs(1), rx).await;
        assert!(matches!(result, Ok(Err(_))));
    }

    #[tokio::test]
    async fn test_destroy_clears_lifetime() {
        let mut lifetime = Lifetime::new();
        lifetime.add(Subscription::spawn(std::future::pending()));
        lifetime.add(Subscription::spawn(std::future::pending()));
        assert_eq!(lifetime.len(), 2);

        lifetime.destroy();
        assert!(lifetime.is_empty());
    }
}
