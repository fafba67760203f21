use chrono::{DateTime, Utc};
use nimbus_core::Pod;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{Result, SchedulerError};

/// Capped exponential retry backoff.
///
/// The first failure waits `base`, each further failure doubles the wait
/// up to `cap`, so retry storms stay bounded while transient conditions
/// recover promptly.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Delay after the first failed attempt
    pub base: Duration,
    /// Ceiling for the delay
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(10),
        }
    }
}

impl BackoffPolicy {
    /// Delay before retrying an item that has made `attempts` attempts
    pub fn delay(&self, attempts: u32) -> Duration {
        let exp = attempts.saturating_sub(1).min(31);
        let delay = self.base.checked_mul(1u32 << exp).unwrap_or(self.cap);
        delay.min(self.cap)
    }
}

/// One unit of work awaiting a scheduling decision.
///
/// Owned by the queue while pending; ownership moves to the scheduling
/// cycle for the duration of one attempt via `pop`, and returns through
/// `add_unschedulable` or is released through `finish`.
#[derive(Debug, Clone)]
pub struct QueuedPod {
    /// The pod awaiting placement
    pub pod: Pod,
    /// Pod name, the queue identifier
    pub name: String,
    /// When the item first entered the queue
    pub arrived_at: DateTime<Utc>,
    /// Consecutive scheduling attempts, incremented on each hand-off
    pub attempts: u32,
    /// When the most recent attempt began
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Reason the most recent attempt failed
    pub last_failure: Option<String>,
    /// Earliest instant the backoff allows a retry
    retry_at: Option<Instant>,
}

impl QueuedPod {
    fn new(name: String, pod: Pod) -> Self {
        Self {
            pod,
            name,
            arrived_at: Utc::now(),
            attempts: 0,
            last_attempt_at: None,
            last_failure: None,
            retry_at: None,
        }
    }
}

/// Which partition holds a queued item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePartition {
    Active,
    Unschedulable,
}

/// Operator-visible snapshot of one queued item
#[derive(Debug, Clone)]
pub struct QueueItemStatus {
    pub name: String,
    pub partition: QueuePartition,
    pub attempts: u32,
    pub last_failure: Option<String>,
}

struct QueueInner {
    /// Ready items, kept ordered by (arrival time, name)
    active: VecDeque<QueuedPod>,
    /// Items whose last attempt failed, keyed by name
    unschedulable: HashMap<String, QueuedPod>,
    /// Items currently owned by the scheduling cycle
    in_flight: HashSet<String>,
    /// In-flight names removed mid-attempt; discarded when the cycle
    /// returns them instead of being requeued
    discarded: HashSet<String>,
    shut_down: bool,
}

impl QueueInner {
    fn contains(&self, name: &str) -> bool {
        self.in_flight.contains(name)
            || self.unschedulable.contains_key(name)
            || self.active.iter().any(|item| item.name == name)
    }

    fn insert_active(&mut self, item: QueuedPod) {
        let pos = {
            let key = (item.arrived_at, item.name.as_str());
            self.active
                .iter()
                .position(|queued| (queued.arrived_at, queued.name.as_str()) > key)
                .unwrap_or(self.active.len())
        };
        self.active.insert(pos, item);
    }
}

/// Concurrency-safe holding area for pending work.
///
/// All mutation is serialized under one lock; `pop` parks on a `Notify`
/// rather than polling. An item name lives in exactly one of
/// {active, unschedulable, in-flight} at any instant.
pub struct SchedulingQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    backoff: BackoffPolicy,
}

impl SchedulingQueue {
    /// Create an empty queue with the given backoff policy
    pub fn new(backoff: BackoffPolicy) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                active: VecDeque::new(),
                unschedulable: HashMap::new(),
                in_flight: HashSet::new(),
                discarded: HashSet::new(),
                shut_down: false,
            }),
            notify: Notify::new(),
            backoff,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        // Queue state stays consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a new item into the active partition.
    ///
    /// A name already present in any partition (or in flight) is rejected
    /// with `AlreadyQueued`; callers that race the event feed may treat
    /// that as benign.
    pub fn add(&self, pod: Pod) -> Result<()> {
        let name = pod
            .metadata
            .name
            .clone()
            .ok_or_else(|| SchedulerError::internal("pod has no name"))?;

        {
            let mut inner = self.lock();
            if inner.shut_down {
                return Err(SchedulerError::QueueShutdown);
            }
            if inner.contains(&name) {
                return Err(SchedulerError::already_queued(name));
            }
            debug!("Pod {} entered the active queue", name);
            inner.insert_active(QueuedPod::new(name, pod));
        }

        self.notify.notify_waiters();
        Ok(())
    }

    /// Remove and return the head of the active partition (FIFO by
    /// arrival time), suspending while it is empty.
    ///
    /// Returns `None` once shutdown has begun; the attempt counter and
    /// last-attempt stamp are updated on hand-off.
    pub async fn pop(&self) -> Option<QueuedPod> {
        loop {
            // Register for wakeup before checking, so an add between the
            // check and the await cannot be missed
            let notified = self.notify.notified();

            {
                let mut inner = self.lock();
                if inner.shut_down {
                    return None;
                }
                if let Some(mut item) = inner.active.pop_front() {
                    item.attempts += 1;
                    item.last_attempt_at = Some(Utc::now());
                    inner.in_flight.insert(item.name.clone());
                    return Some(item);
                }
            }

            notified.await;
        }
    }

    /// Return a failed item to the unschedulable partition.
    ///
    /// Stamps the failure reason and starts a backoff window derived from
    /// the item's attempt count.
    pub fn add_unschedulable(&self, mut item: QueuedPod, reason: &str) {
        let delay = self.backoff.delay(item.attempts);
        item.last_failure = Some(reason.to_string());
        item.retry_at = Some(Instant::now() + delay);

        let mut inner = self.lock();
        inner.in_flight.remove(&item.name);
        if inner.discarded.remove(&item.name) {
            debug!("Pod {} was removed while in flight; discarding", item.name);
            return;
        }

        debug!(
            "Pod {} moved to unschedulable ({}); retry in {:?} after attempt {}",
            item.name, reason, delay, item.attempts
        );
        inner.unschedulable.insert(item.name.clone(), item);
    }

    /// Release queue ownership of a successfully bound item
    pub fn finish(&self, item: &QueuedPod) {
        let mut inner = self.lock();
        inner.in_flight.remove(&item.name);
        inner.discarded.remove(&item.name);
    }

    /// Move every unschedulable item matching the predicate back to
    /// active, clearing its backoff window. Returns how many moved.
    pub fn move_all_to_active<F>(&self, predicate: F) -> usize
    where
        F: Fn(&QueuedPod) -> bool,
    {
        let moved = {
            let mut inner = self.lock();
            let names: Vec<String> = inner
                .unschedulable
                .values()
                .filter(|item| predicate(item))
                .map(|item| item.name.clone())
                .collect();

            for name in &names {
                if let Some(mut item) = inner.unschedulable.remove(name) {
                    item.retry_at = None;
                    inner.insert_active(item);
                }
            }
            names.len()
        };

        if moved > 0 {
            debug!("Moved {} unschedulable items back to active", moved);
            self.notify.notify_waiters();
        }
        moved
    }

    /// Move every unschedulable item whose backoff window has elapsed
    /// back to active. The engine's sweeper calls this periodically so
    /// items retry eventually even without a matching cluster event.
    pub fn move_expired_to_active(&self) -> usize {
        let now = Instant::now();
        self.move_all_to_active(|item| item.retry_at.is_none_or(|at| at <= now))
    }

    /// Drop an item from whichever partition holds it.
    ///
    /// An item currently owned by the scheduling cycle cannot be taken
    /// back; it is marked discarded instead, and dropped when the cycle
    /// hands it back through `add_unschedulable`.
    pub fn remove(&self, name: &str) -> bool {
        let mut inner = self.lock();
        if inner.unschedulable.remove(name).is_some() {
            return true;
        }
        if let Some(pos) = inner.active.iter().position(|item| item.name == name) {
            inner.active.remove(pos);
            return true;
        }
        if inner.in_flight.remove(name) {
            inner.discarded.insert(name.to_string());
            return true;
        }
        false
    }

    /// Operator-visible snapshot of every pending item
    pub fn statuses(&self) -> Vec<QueueItemStatus> {
        let inner = self.lock();
        let mut statuses: Vec<QueueItemStatus> = inner
            .active
            .iter()
            .map(|item| QueueItemStatus {
                name: item.name.clone(),
                partition: QueuePartition::Active,
                attempts: item.attempts,
                last_failure: item.last_failure.clone(),
            })
            .chain(inner.unschedulable.values().map(|item| QueueItemStatus {
                name: item.name.clone(),
                partition: QueuePartition::Unschedulable,
                attempts: item.attempts,
                last_failure: item.last_failure.clone(),
            }))
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    /// Number of items ready for immediate consideration
    pub fn active_len(&self) -> usize {
        self.lock().active.len()
    }

    /// Number of items waiting out a failure
    pub fn unschedulable_len(&self) -> usize {
        self.lock().unschedulable.len()
    }

    /// Begin shutdown: wake all poppers and refuse new items
    pub fn shutdown(&self) {
        {
            let mut inner = self.lock();
            inner.shut_down = true;
        }
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::{sleep, timeout};

    fn make_test_pod(name: &str) -> Pod {
        let mut pod = Pod::default();
        pod.metadata.name = Some(name.to_string());
        pod
    }

    fn tiny_backoff() -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_millis(10),
            cap: Duration::from_millis(40),
        }
    }

    #[test]
    fn test_backoff_is_monotone_and_capped() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
        assert_eq!(policy.delay(4), Duration::from_secs(8));
        assert_eq!(policy.delay(5), Duration::from_secs(10));
        assert_eq!(policy.delay(50), Duration::from_secs(10));

        let mut last = Duration::ZERO;
        for attempts in 1..20 {
            let delay = policy.delay(attempts);
            assert!(delay >= last);
            last = delay;
        }
    }

    #[tokio::test]
    async fn test_pop_is_fifo_by_arrival() {
        let queue = SchedulingQueue::new(BackoffPolicy::default());
        queue.add(make_test_pod("first")).unwrap();
        queue.add(make_test_pod("second")).unwrap();
        queue.add(make_test_pod("third")).unwrap();

        assert_eq!(queue.pop().await.unwrap().name, "first");
        assert_eq!(queue.pop().await.unwrap().name, "second");
        assert_eq!(queue.pop().await.unwrap().name, "third");
    }

    #[tokio::test]
    async fn test_add_duplicate_is_rejected() {
        let queue = SchedulingQueue::new(BackoffPolicy::default());
        queue.add(make_test_pod("nginx")).unwrap();

        let err = queue.add(make_test_pod("nginx")).unwrap_err();
        assert!(matches!(err, SchedulerError::AlreadyQueued { .. }));
        assert_eq!(queue.active_len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_rejected_while_unschedulable_and_in_flight() {
        let queue = SchedulingQueue::new(BackoffPolicy::default());
        queue.add(make_test_pod("nginx")).unwrap();

        // In flight
        let item = queue.pop().await.unwrap();
        assert!(queue.add(make_test_pod("nginx")).is_err());

        // Unschedulable
        queue.add_unschedulable(item, "no feasible node");
        assert!(queue.add(make_test_pod("nginx")).is_err());
    }

    #[tokio::test]
    async fn test_pop_blocks_until_add() {
        let queue = Arc::new(SchedulingQueue::new(BackoffPolicy::default()));

        let popper = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        sleep(Duration::from_millis(20)).await;
        assert!(!popper.is_finished());

        queue.add(make_test_pod("nginx")).unwrap();
        let item = timeout(Duration::from_secs(1), popper)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(item.name, "nginx");
    }

    #[tokio::test]
    async fn test_shutdown_wakes_popper_with_none() {
        let queue = Arc::new(SchedulingQueue::new(BackoffPolicy::default()));

        let popper = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        sleep(Duration::from_millis(20)).await;
        queue.shutdown();

        let result = timeout(Duration::from_secs(1), popper).await.unwrap().unwrap();
        assert!(result.is_none());

        // No new items after shutdown begins
        let err = queue.add(make_test_pod("late")).unwrap_err();
        assert!(matches!(err, SchedulerError::QueueShutdown));
    }

    #[tokio::test]
    async fn test_pop_increments_attempts() {
        let queue = SchedulingQueue::new(BackoffPolicy::default());
        queue.add(make_test_pod("nginx")).unwrap();

        let item = queue.pop().await.unwrap();
        assert_eq!(item.attempts, 1);
        assert!(item.last_attempt_at.is_some());

        queue.add_unschedulable(item, "bind failed");
        queue.move_all_to_active(|_| true);

        let item = queue.pop().await.unwrap();
        assert_eq!(item.attempts, 2);
        assert_eq!(item.last_failure.as_deref(), Some("bind failed"));
    }

    #[tokio::test]
    async fn test_item_in_exactly_one_partition() {
        let queue = SchedulingQueue::new(BackoffPolicy::default());
        queue.add(make_test_pod("nginx")).unwrap();
        assert_eq!(queue.active_len(), 1);
        assert_eq!(queue.unschedulable_len(), 0);

        let item = queue.pop().await.unwrap();
        assert_eq!(queue.active_len(), 0);
        assert_eq!(queue.unschedulable_len(), 0);

        queue.add_unschedulable(item, "no feasible node");
        assert_eq!(queue.active_len(), 0);
        assert_eq!(queue.unschedulable_len(), 1);

        queue.move_all_to_active(|_| true);
        assert_eq!(queue.active_len(), 1);
        assert_eq!(queue.unschedulable_len(), 0);
    }

    #[tokio::test]
    async fn test_move_all_to_active_respects_predicate() {
        let queue = SchedulingQueue::new(BackoffPolicy::default());
        queue.add(make_test_pod("keep")).unwrap();
        queue.add(make_test_pod("move")).unwrap();

        let keep = queue.pop().await.unwrap();
        let to_move = queue.pop().await.unwrap();
        queue.add_unschedulable(keep, "no feasible node");
        queue.add_unschedulable(to_move, "no feasible node");

        let moved = queue.move_all_to_active(|item| item.name == "move");
        assert_eq!(moved, 1);
        assert_eq!(queue.active_len(), 1);
        assert_eq!(queue.unschedulable_len(), 1);
        assert_eq!(queue.pop().await.unwrap().name, "move");
    }

    #[tokio::test]
    async fn test_move_expired_honors_backoff_window() {
        let queue = SchedulingQueue::new(tiny_backoff());
        queue.add(make_test_pod("nginx")).unwrap();

        let item = queue.pop().await.unwrap();
        queue.add_unschedulable(item, "bind failed");

        // Backoff has not elapsed yet
        assert_eq!(queue.move_expired_to_active(), 0);

        sleep(Duration::from_millis(30)).await;
        assert_eq!(queue.move_expired_to_active(), 1);
        assert_eq!(queue.active_len(), 1);
    }

    #[tokio::test]
    async fn test_readmitted_item_keeps_arrival_order() {
        let queue = SchedulingQueue::new(tiny_backoff());
        queue.add(make_test_pod("old")).unwrap();
        sleep(Duration::from_millis(5)).await;
        queue.add(make_test_pod("young")).unwrap();

        let old = queue.pop().await.unwrap();
        queue.add_unschedulable(old, "no feasible node");
        queue.move_all_to_active(|_| true);

        // The re-admitted item arrived first, so it pops first
        assert_eq!(queue.pop().await.unwrap().name, "old");
        assert_eq!(queue.pop().await.unwrap().name, "young");
    }

    #[tokio::test]
    async fn test_remove_drops_from_either_partition() {
        let queue = SchedulingQueue::new(BackoffPolicy::default());
        queue.add(make_test_pod("failed")).unwrap();

        let item = queue.pop().await.unwrap();
        queue.add_unschedulable(item, "no feasible node");
        queue.add(make_test_pod("active")).unwrap();

        assert!(queue.remove("failed"));
        assert!(queue.remove("active"));
        assert!(!queue.remove("missing"));
        assert_eq!(queue.statuses().len(), 0);
    }

    #[tokio::test]
    async fn test_remove_while_in_flight_discards_on_return() {
        let queue = SchedulingQueue::new(BackoffPolicy::default());
        queue.add(make_test_pod("nginx")).unwrap();
        let item = queue.pop().await.unwrap();

        // Removed while the cycle owns it; the return must not requeue
        assert!(queue.remove("nginx"));
        queue.add_unschedulable(item, "bind failed");

        assert_eq!(queue.unschedulable_len(), 0);
        assert_eq!(queue.statuses().len(), 0);

        // The name is free again for a re-created pod
        queue.add(make_test_pod("nginx")).unwrap();
        assert_eq!(queue.active_len(), 1);
    }

    #[tokio::test]
    async fn test_finish_clears_in_flight_removal_mark() {
        let queue = SchedulingQueue::new(BackoffPolicy::default());
        queue.add(make_test_pod("nginx")).unwrap();
        let item = queue.pop().await.unwrap();

        assert!(queue.remove("nginx"));
        queue.finish(&item);

        // A later item under the same name must not inherit the mark
        queue.add(make_test_pod("nginx")).unwrap();
        let item = queue.pop().await.unwrap();
        queue.add_unschedulable(item, "no feasible node");
        assert_eq!(queue.unschedulable_len(), 1);
    }

    #[tokio::test]
    async fn test_statuses_surface_failure_reason() {
        let queue = SchedulingQueue::new(BackoffPolicy::default());
        queue.add(make_test_pod("stuck")).unwrap();

        let item = queue.pop().await.unwrap();
        queue.add_unschedulable(item, "no feasible node");
        queue.add(make_test_pod("pending")).unwrap();

        let statuses = queue.statuses();
        assert_eq!(statuses.len(), 2);

        let pending = statuses.iter().find(|s| s.name == "pending").unwrap();
        assert_eq!(pending.partition, QueuePartition::Active);
        assert_eq!(pending.attempts, 0);
        assert!(pending.last_failure.is_none());

        let stuck = statuses.iter().find(|s| s.name == "stuck").unwrap();
        assert_eq!(stuck.partition, QueuePartition::Unschedulable);
        assert_eq!(stuck.last_failure.as_deref(), Some("no feasible node"));
        assert_eq!(stuck.attempts, 1);
    }
}
