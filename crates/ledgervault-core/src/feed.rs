//! Read-only projections of upstream ledger feeds.
//!
//! Upstream feeds publish full snapshots (never deltas) over a
//! `tokio::sync::watch` channel. A [`Projection`] mirrors one such feed into
//! its own channel. The forwarding task is the only writer; everyone else
//! reads. Snapshots are forwarded in the order the upstream emits them.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

/// A cache that only its upstream subscription can write.
///
/// Must be created inside a Tokio runtime. Dropping the projection stops the
/// forwarding task; existing subscribers then see the channel close.
#[derive(Debug)]
pub struct Projection<T> {
    current: watch::Receiver<T>,
    forwarder: JoinHandle<()>,
}

impl<T> Projection<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start mirroring `upstream`.
    pub fn follow(mut upstream: watch::Receiver<T>) -> Self {
        let initial = upstream.borrow_and_update().clone();
        let (publisher, current) = watch::channel(initial);

        let forwarder = tokio::spawn(async move {
            while upstream.changed().await.is_ok() {
                let snapshot = upstream.borrow_and_update().clone();
                if publisher.send(snapshot).is_err() {
                    break;
                }
            }
            trace!("upstream feed closed");
        });

        Self { current, forwarder }
    }

    /// A clone of the latest snapshot.
    pub fn get(&self) -> T {
        self.current.borrow().clone()
    }

    /// Run `f` against the latest snapshot without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.current.borrow())
    }

    /// Subscribe to future snapshots.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.current.clone()
    }
}

impl<T> Drop for Projection<T> {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_starts_with_upstream_value() {
        let (_tx, rx) = watch::channel(vec![1u8]);
        let projection = Projection::follow(rx);

        assert_eq!(projection.get(), vec![1]);
    }

    #[tokio::test]
    async fn test_follows_upstream_in_order() {
        let (tx, rx) = watch::channel(0u32);
        let projection = Projection::follow(rx);
        let mut sub = projection.subscribe();

        tx.send(1).unwrap();
        tokio::time::timeout(Duration::from_secs(1), sub.wait_for(|v| *v == 1))
            .await
            .unwrap()
            .unwrap();

        tx.send(2).unwrap();
        tokio::time::timeout(Duration::from_secs(1), sub.wait_for(|v| *v == 2))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(projection.get(), 2);
        assert_eq!(projection.with(|v| *v + 1), 3);
    }

    #[tokio::test]
    async fn test_drop_closes_subscribers() {
        let (_tx, rx) = watch::channel(0u32);
        let projection = Projection::follow(rx);
        let mut sub = projection.subscribe();

        drop(projection);

        let closed = tokio::time::timeout(Duration::from_secs(1), sub.changed())
            .await
            .unwrap();
        assert!(closed.is_err());
    }
}
