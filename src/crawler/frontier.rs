//! Frontier for one archive job
//!
//! The frontier owns everything the workers of a job share:
//! - The FIFO queue of URLs waiting to be fetched
//! - The visited set, so that no normalized URL is admitted twice
//! - The page budget accounting
//! - The number of fetches currently in flight
//!
//! All of it sits behind a single mutex. Workers that find the queue empty
//! while other fetches are still running park on a [`Notify`] until either a
//! new URL is pushed or the job runs dry.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

/// A URL waiting in the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// The normalized URL
    pub url: String,

    /// Number of hops from the seed (the seed itself is 0)
    pub depth: u32,
}

/// What happened to a pushed URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The URL was new and has been queued
    Admitted,

    /// The URL was admitted earlier in this job
    AlreadySeen,

    /// The job has already admitted as many URLs as its budget allows
    BudgetExhausted,

    /// The frontier was closed
    Closed,
}

#[derive(Debug, Default)]
struct FrontierState {
    queue: VecDeque<FrontierEntry>,
    visited: HashSet<String>,
    admitted: u32,
    in_flight: u32,
    closed: bool,
}

impl FrontierState {
    fn is_exhausted(&self) -> bool {
        self.closed || (self.queue.is_empty() && self.in_flight == 0)
    }
}

/// Shared work queue of one job
#[derive(Debug)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    notify: Notify,
    page_budget: u32,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `page_budget` - Maximum number of distinct URLs this frontier will ever admit
    pub fn new(page_budget: u32) -> Self {
        Self {
            state: Mutex::new(FrontierState::default()),
            notify: Notify::new(),
            page_budget,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        // Every critical section leaves the state consistent, so a panic in
        // one holder does not invalidate it.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Offers a URL to the frontier
    ///
    /// The URL is admitted only if it has not been seen in this job and the
    /// budget has room left. Admission marks it visited, counts it against
    /// the budget and appends it to the queue.
    pub fn push(&self, url: impl Into<String>, depth: u32) -> PushOutcome {
        let url = url.into();
        let mut state = self.lock();

        if state.closed {
            return PushOutcome::Closed;
        }
        if state.visited.contains(&url) {
            return PushOutcome::AlreadySeen;
        }
        if state.admitted >= self.page_budget {
            return PushOutcome::BudgetExhausted;
        }

        state.visited.insert(url.clone());
        state.admitted += 1;
        state.queue.push_back(FrontierEntry { url, depth });
        drop(state);

        self.notify.notify_waiters();
        PushOutcome::Admitted
    }

    /// Takes the next URL to fetch
    ///
    /// The returned entry counts as in flight until [`Frontier::complete`]
    /// is called for it. If the queue is empty but other entries are still in
    /// flight, this waits, because their pages may yield new links.
    ///
    /// # Returns
    ///
    /// * `Some(FrontierEntry)` - The next URL, in FIFO order
    /// * `None` - The queue is empty and nothing is in flight, or the frontier was closed
    pub async fn pop(&self) -> Option<FrontierEntry> {
        loop {
            let notified = {
                let mut state = self.lock();
                if state.closed {
                    return None;
                }
                if let Some(entry) = state.queue.pop_front() {
                    state.in_flight += 1;
                    return Some(entry);
                }
                if state.in_flight == 0 {
                    return None;
                }

                // Registered before the lock is released so a wake-up between
                // here and the await cannot be missed.
                self.notify.notified()
            };

            notified.await;
        }
    }

    /// Marks one popped entry as done
    pub fn complete(&self) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        let exhausted = state.is_exhausted();
        drop(state);

        if exhausted {
            self.notify.notify_waiters();
        }
    }

    /// Closes the frontier
    ///
    /// The queue is dropped, further pushes are refused and every waiting
    /// [`Frontier::pop`] returns `None`.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.queue.clear();
        drop(state);

        self.notify.notify_waiters();
    }

    /// Number of URLs that can still be admitted
    pub fn remaining_budget(&self) -> u32 {
        self.page_budget.saturating_sub(self.lock().admitted)
    }

    /// Number of URLs admitted so far
    pub fn admitted(&self) -> u32 {
        self.lock().admitted
    }

    /// Number of popped entries not yet completed
    pub fn in_flight(&self) -> u32 {
        self.lock().in_flight
    }

    /// Number of entries waiting in the queue
    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    /// Returns true once no more work can appear
    pub fn is_exhausted(&self) -> bool {
        self.lock().is_exhausted()
    }

    /// Returns true if the frontier was closed
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_push_admits_new_url() {
        let frontier = Frontier::new(10);
        assert_eq!(frontier.push("https://example.com/", 0), PushOutcome::Admitted);
        assert_eq!(frontier.admitted(), 1);
        assert_eq!(frontier.remaining_budget(), 9);
        assert_eq!(frontier.queued(), 1);
    }

    #[test]
    fn test_push_rejects_duplicate() {
        let frontier = Frontier::new(10);
        frontier.push("https://example.com/a", 1);
        assert_eq!(
            frontier.push("https://example.com/a", 2),
            PushOutcome::AlreadySeen
        );
        assert_eq!(frontier.admitted(), 1);
    }

    #[test]
    fn test_push_respects_budget() {
        let frontier = Frontier::new(2);
        assert_eq!(frontier.push("https://example.com/1", 0), PushOutcome::Admitted);
        assert_eq!(frontier.push("https://example.com/2", 1), PushOutcome::Admitted);
        assert_eq!(
            frontier.push("https://example.com/3", 1),
            PushOutcome::BudgetExhausted
        );
        assert_eq!(frontier.remaining_budget(), 0);
    }

    #[test]
    fn test_seen_url_reported_before_budget() {
        let frontier = Frontier::new(1);
        frontier.push("https://example.com/", 0);
        assert_eq!(
            frontier.push("https://example.com/", 1),
            PushOutcome::AlreadySeen
        );
    }

    #[tokio::test]
    async fn test_pop_is_fifo() {
        let frontier = Frontier::new(10);
        frontier.push("https://example.com/a", 0);
        frontier.push("https://example.com/b", 1);

        let first = frontier.pop().await.unwrap();
        let second = frontier.pop().await.unwrap();
        assert_eq!(first.url, "https://example.com/a");
        assert_eq!(first.depth, 0);
        assert_eq!(second.url, "https://example.com/b");
        assert_eq!(frontier.in_flight(), 2);
    }

    #[tokio::test]
    async fn test_pop_returns_none_when_empty() {
        let frontier = Frontier::new(10);
        assert!(frontier.pop().await.is_none());
        assert!(frontier.is_exhausted());
    }

    #[tokio::test]
    async fn test_completed_url_stays_visited() {
        let frontier = Frontier::new(10);
        frontier.push("https://example.com/", 0);
        frontier.pop().await.unwrap();
        frontier.complete();

        assert_eq!(frontier.push("https://example.com/", 1), PushOutcome::AlreadySeen);
        assert!(frontier.pop().await.is_none());
    }

    #[tokio::test]
    async fn test_pop_waits_for_in_flight_work() {
        let frontier = Arc::new(Frontier::new(10));
        frontier.push("https://example.com/", 0);
        frontier.pop().await.unwrap();

        let waiter = {
            let frontier = Arc::clone(&frontier);
            tokio::spawn(async move { frontier.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        frontier.push("https://example.com/next", 1);
        let entry = waiter.await.unwrap().unwrap();
        assert_eq!(entry.url, "https://example.com/next");
    }

    #[tokio::test]
    async fn test_waiters_released_when_exhausted() {
        let frontier = Arc::new(Frontier::new(10));
        frontier.push("https://example.com/", 0);
        frontier.pop().await.unwrap();

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let frontier = Arc::clone(&frontier);
                tokio::spawn(async move { frontier.pop().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        frontier.complete();

        for waiter in waiters {
            assert!(waiter.await.unwrap().is_none());
        }
        assert!(frontier.is_exhausted());
    }

    #[tokio::test]
    async fn test_close_releases_waiters_and_refuses_pushes() {
        let frontier = Arc::new(Frontier::new(10));
        frontier.push("https://example.com/", 0);
        frontier.push("https://example.com/queued", 1);
        frontier.pop().await.unwrap();

        frontier.close();
        assert!(frontier.is_closed());
        assert_eq!(frontier.queued(), 0);
        assert!(frontier.pop().await.is_none());
        assert_eq!(
            frontier.push("https://example.com/late", 1),
            PushOutcome::Closed
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_pushes_never_exceed_budget() {
        let frontier = Arc::new(Frontier::new(25));
        let mut tasks = Vec::new();

        for worker in 0..8 {
            let frontier = Arc::clone(&frontier);
            tasks.push(tokio::spawn(async move {
                let mut admitted = 0;
                for i in 0..50 {
                    // Half of the URLs collide across workers
                    let url = if i % 2 == 0 {
                        format!("https://example.com/shared/{}", i)
                    } else {
                        format!("https://example.com/{}/{}", worker, i)
                    };
                    if frontier.push(url, 1) == PushOutcome::Admitted {
                        admitted += 1;
                    }
                    tokio::task::yield_now().await;
                }
                admitted
            }));
        }

        let mut total = 0;
        for task in tasks {
            total += task.await.unwrap();
        }

        assert_eq!(total, 25);
        assert_eq!(frontier.admitted(), 25);
        assert_eq!(frontier.queued(), 25);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_workers_drain_each_url_once() {
        let frontier = Arc::new(Frontier::new(100));
        frontier.push("https://example.com/0", 0);

        let mut workers = Vec::new();
        for _ in 0..4 {
            let frontier = Arc::clone(&frontier);
            workers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(entry) = frontier.pop().await {
                    let n: u32 = entry
                        .url
                        .rsplit('/')
                        .next()
                        .and_then(|s| s.parse().ok())
                        .unwrap();
                    for child in [n * 2 + 1, n * 2 + 2] {
                        if child < 60 {
                            frontier.push(format!("https://example.com/{}", child), entry.depth + 1);
                        }
                    }
                    seen.push(entry.url);
                    frontier.complete();
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for worker in workers {
            all.extend(worker.await.unwrap());
        }

        let unique: HashSet<_> = all.iter().cloned().collect();
        assert_eq!(all.len(), 60);
        assert_eq!(unique.len(), 60);
        assert!(frontier.is_exhausted());
    }
}
