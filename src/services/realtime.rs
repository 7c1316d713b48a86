//! Realtime change feed for borrow requests and the pending-count badge

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use sqlx::{postgres::PgListener, Pool, Postgres};
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use uuid::Uuid;

use crate::{
    config::{FeedSource, RealtimeConfig},
    error::AppResult,
    models::ChangeEvent,
    repository::BorrowRequestStore,
};

/// Fan-out of borrow request changes to every subscriber
#[derive(Clone)]
pub struct ChangeFeed {
    inner: Arc<FeedInner>,
}

struct FeedInner {
    sender: broadcast::Sender<ChangeEvent>,
    source: FeedSource,
    active: AtomicUsize,
    closed: watch::Sender<bool>,
}

impl ChangeFeed {
    pub fn new(config: &RealtimeConfig) -> Self {
        let (sender, _) = broadcast::channel(config.capacity.max(1));
        let (closed, _) = watch::channel(false);
        Self {
            inner: Arc::new(FeedInner {
                sender,
                source: config.source,
                active: AtomicUsize::new(0),
                closed,
            }),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let active = self.inner.active.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!("Change feed subscription opened ({} active)", active);
        Subscription {
            receiver: self.inner.sender.subscribe(),
            closed: self.inner.closed.subscribe(),
            feed: self.inner.clone(),
        }
    }

    /// End every current and future subscription. Called on server shutdown
    /// so long-lived streams fed by the feed finish.
    pub fn close(&self) {
        if !self.inner.closed.send_replace(true) {
            tracing::info!(
                "Change feed closed ({} active subscriptions)",
                self.active_subscriptions()
            );
        }
    }

    /// Deliver an event to all current subscribers
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.inner.sender.send(event);
    }

    /// Publish a mutation confirmed by this process. Ignored when the
    /// database trigger is the event source, since it will report it.
    pub fn record(&self, event: ChangeEvent) {
        if self.inner.source == FeedSource::Local {
            self.publish(event);
        }
    }

    pub fn active_subscriptions(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }
}

/// Open subscription to the change feed.
///
/// Yields events until dropped. Released exactly once, by [`Subscription::unsubscribe`]
/// or by drop.
pub struct Subscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    closed: watch::Receiver<bool>,
    feed: Arc<FeedInner>,
}

impl Subscription {
    /// Wait for the next change. Missed events collapse into one `resync` event.
    /// Returns `None` once the feed is closed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        tokio::select! {
            biased;
            _ = self.closed.wait_for(|closed| *closed) => None,
            received = self.receiver.recv() => match received {
                Ok(event) => Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!("Change feed subscriber lagged by {} events", missed);
                    Some(ChangeEvent::resync())
                }
                Err(broadcast::error::RecvError::Closed) => None,
            },
        }
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let remaining = self.feed.active.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::debug!("Change feed subscription closed ({} active)", remaining);
    }
}

/// Live count of pending requests received by one owner.
///
/// A background task recomputes the count from the store on every change
/// event; event payloads are never trusted. The task unsubscribes and exits
/// once every clone of the badge is dropped or the feed is closed; the
/// counter's sender goes with it, so readers see the channel close.
#[derive(Clone)]
pub struct PendingBadge {
    counter: watch::Receiver<i64>,
}

impl PendingBadge {
    /// Subscribe, compute the first count, then keep it current in the background.
    ///
    /// The subscription is taken before the first count so no change is missed
    /// in between.
    pub async fn open(
        feed: &ChangeFeed,
        requests: Arc<dyn BorrowRequestStore>,
        owner_id: Uuid,
    ) -> AppResult<Self> {
        let subscription = feed.subscribe();
        let initial = requests.count_pending(owner_id).await?;
        let (sender, counter) = watch::channel(initial);
        tokio::spawn(run_badge(subscription, requests, owner_id, sender));
        Ok(Self { counter })
    }

    /// Last computed count
    pub fn current(&self) -> i64 {
        *self.counter.borrow()
    }

    /// Wait until the count satisfies `predicate`
    pub async fn wait_for(&mut self, predicate: impl FnMut(&i64) -> bool) -> Option<i64> {
        self.counter.wait_for(predicate).await.ok().map(|count| *count)
    }

    pub fn into_receiver(self) -> watch::Receiver<i64> {
        self.counter
    }
}

async fn run_badge(
    mut subscription: Subscription,
    requests: Arc<dyn BorrowRequestStore>,
    owner_id: Uuid,
    counter: watch::Sender<i64>,
) {
    loop {
        tokio::select! {
            _ = counter.closed() => break,
            event = subscription.next() => match event {
                Some(_) => recompute(&*requests, owner_id, &counter).await,
                None => break,
            },
        }
    }
    subscription.unsubscribe();
    tracing::debug!("Pending badge for {} stopped", owner_id);
}

async fn recompute(requests: &dyn BorrowRequestStore, owner_id: Uuid, counter: &watch::Sender<i64>) {
    match requests.count_pending(owner_id).await {
        Ok(count) => {
            counter.send_if_modified(|current| {
                let changed = *current != count;
                *current = count;
                changed
            });
        }
        Err(e) => tracing::warn!("Failed to refresh pending count for {}: {}", owner_id, e),
    }
}

/// Forward PostgreSQL NOTIFY payloads from `channel` into the feed
pub async fn listen_database(
    pool: &Pool<Postgres>,
    feed: ChangeFeed,
    channel: &str,
) -> AppResult<JoinHandle<()>> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(channel).await?;
    tracing::info!("Listening for borrow request changes on '{}'", channel);

    Ok(tokio::spawn(async move {
        loop {
            match listener.recv().await {
                Ok(notification) => {
                    let event = serde_json::from_str(notification.payload())
                        .unwrap_or_else(|_| ChangeEvent::resync());
                    feed.publish(event);
                }
                Err(e) => {
                    // PgListener reconnects on the next recv; anything may have changed meanwhile.
                    tracing::warn!("Change listener error: {}", e);
                    feed.publish(ChangeEvent::resync());
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::{
        models::{ChangeKind, RequestStatus},
        repository::{BorrowRequestStore, Repository},
    };

    fn feed(source: FeedSource) -> ChangeFeed {
        ChangeFeed::new(&RealtimeConfig {
            source,
            ..RealtimeConfig::default()
        })
    }

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let feed = feed(FeedSource::Local);
        let mut first = feed.subscribe();
        let mut second = feed.subscribe();
        assert_eq!(feed.active_subscriptions(), 2);

        let event = ChangeEvent::borrow_request(ChangeKind::Insert, Uuid::new_v4());
        feed.publish(event.clone());

        assert_eq!(first.next().await, Some(event.clone()));
        assert_eq!(second.next().await, Some(event));

        first.unsubscribe();
        assert_eq!(feed.active_subscriptions(), 1);
        drop(second);
        assert_eq!(feed.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_record_is_skipped_when_database_is_the_source() {
        let feed = feed(FeedSource::Database);
        let mut subscription = feed.subscribe();

        feed.record(ChangeEvent::borrow_request(ChangeKind::Update, Uuid::new_v4()));
        feed.publish(ChangeEvent::resync());

        assert_eq!(subscription.next().await.map(|e| e.kind), Some(ChangeKind::Resync));
    }

    #[tokio::test]
    async fn test_lagged_subscriber_gets_resync() {
        let feed = ChangeFeed::new(&RealtimeConfig {
            capacity: 1,
            ..RealtimeConfig::default()
        });
        let mut subscription = feed.subscribe();
        feed.publish(ChangeEvent::borrow_request(ChangeKind::Insert, Uuid::new_v4()));
        feed.publish(ChangeEvent::borrow_request(ChangeKind::Insert, Uuid::new_v4()));

        assert_eq!(subscription.next().await.map(|e| e.kind), Some(ChangeKind::Resync));
    }

    #[tokio::test]
    async fn test_badge_converges_to_pending_count() {
        let (repository, _) = Repository::in_memory();
        let feed = feed(FeedSource::Local);
        let owner = Uuid::new_v4();
        let book = Uuid::new_v4();

        let mut ids = Vec::new();
        for _ in 0..3 {
            let request = repository.requests.insert(book, Uuid::new_v4(), owner).await.unwrap();
            ids.push(request.id);
        }
        repository
            .requests
            .resolve_pending(ids[2], owner, RequestStatus::Accepted)
            .await
            .unwrap();

        let mut badge = PendingBadge::open(&feed, repository.requests.clone(), owner)
            .await
            .unwrap();
        assert_eq!(badge.current(), 2);

        repository
            .requests
            .resolve_pending(ids[0], owner, RequestStatus::Accepted)
            .await
            .unwrap();
        feed.publish(ChangeEvent::borrow_request(ChangeKind::Update, ids[0]));

        let count = timeout(Duration::from_secs(1), badge.wait_for(|c| *c == 1)).await.unwrap();
        assert_eq!(count, Some(1));
        assert_eq!(badge.current(), 1);
    }

    #[tokio::test]
    async fn test_badge_keeps_last_value_when_store_fails() {
        let (repository, store) = Repository::in_memory();
        let feed = feed(FeedSource::Local);
        let owner = Uuid::new_v4();
        repository.requests.insert(Uuid::new_v4(), Uuid::new_v4(), owner).await.unwrap();

        let badge = PendingBadge::open(&feed, repository.requests.clone(), owner)
            .await
            .unwrap();
        assert_eq!(badge.current(), 1);

        store.set_unavailable(true);
        feed.publish(ChangeEvent::resync());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(badge.current(), 1);
    }

    #[tokio::test]
    async fn test_dropping_badge_releases_subscription() {
        let (repository, _) = Repository::in_memory();
        let feed = feed(FeedSource::Local);

        let badge = PendingBadge::open(&feed, repository.requests.clone(), Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(feed.active_subscriptions(), 1);
        drop(badge);

        timeout(Duration::from_secs(1), async {
            while feed.active_subscriptions() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_badge_starts_from_stored_count() {
        let (repository, _) = Repository::in_memory();
        let feed = feed(FeedSource::Local);
        let owner = Uuid::new_v4();
        for _ in 0..2 {
            repository.requests.insert(Uuid::new_v4(), Uuid::new_v4(), owner).await.unwrap();
        }

        let badge = PendingBadge::open(&feed, repository.requests.clone(), owner)
            .await
            .unwrap();
        let receiver = badge.into_receiver();
        assert_eq!(*receiver.borrow(), 2);
        assert!(!receiver.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_badge_fails_to_open_when_store_is_down() {
        let (repository, store) = Repository::in_memory();
        let feed = feed(FeedSource::Local);
        store.set_unavailable(true);

        let opened = PendingBadge::open(&feed, repository.requests.clone(), Uuid::new_v4()).await;
        assert!(opened.is_err());
        assert_eq!(feed.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_closed_feed_ends_subscriptions_and_badges() {
        let (repository, _) = Repository::in_memory();
        let feed = feed(FeedSource::Local);
        let mut subscription = feed.subscribe();
        let mut badge = PendingBadge::open(&feed, repository.requests.clone(), Uuid::new_v4())
            .await
            .unwrap();

        feed.close();
        assert_eq!(timeout(Duration::from_secs(1), subscription.next()).await.unwrap(), None);
        assert_eq!(
            timeout(Duration::from_secs(1), badge.wait_for(|c| *c > 0)).await.unwrap(),
            None
        );

        let mut late = feed.subscribe();
        assert_eq!(timeout(Duration::from_secs(1), late.next()).await.unwrap(), None);
    }
}
