//! Crawl frontier: FIFO pending queue plus visited set.
//!
//! [`FrontierState`] is the single owner of crawl order. Single-flow runs use it
//! directly; multi-worker runs share it through [`SharedFrontier`], which takes
//! one lock per operation and never holds it across network I/O.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, trace};
use url::Url;

use doccrawl_shared::normalize_url;

// ---------------------------------------------------------------------------
// FrontierState
// ---------------------------------------------------------------------------

/// Pending/visited bookkeeping for one crawl run.
#[derive(Debug)]
pub struct FrontierState {
    pending: VecDeque<Url>,
    /// Canonical strings currently in `pending`.
    queued: HashSet<String>,
    visited: HashSet<String>,
    discovered: usize,
    in_flight: usize,
    budget: Option<usize>,
}

impl FrontierState {
    /// Create an empty frontier with an optional page budget.
    pub fn new(budget: Option<usize>) -> Self {
        Self {
            pending: VecDeque::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
            discovered: 0,
            in_flight: 0,
            budget,
        }
    }

    /// Normalize `url` and queue it unless it is already pending or visited.
    ///
    /// Returns `true` if the URL was queued.
    pub fn seed(&mut self, url: Url) -> bool {
        let url = match normalize_url(url) {
            Ok(url) => url,
            Err(e) => {
                debug!(error = %e, "not seeding invalid URL");
                return false;
            }
        };

        let key = url.as_str();
        if self.queued.contains(key) || self.visited.contains(key) {
            return false;
        }

        trace!(%url, "seeded");
        self.queued.insert(key.to_string());
        self.pending.push_back(url);
        true
    }

    /// Pop the next URL in breadth-first order and mark it visited.
    ///
    /// Returns `None` once the queue is empty or the budget is spent.
    pub fn next(&mut self) -> Option<Url> {
        if self.budget_reached() {
            return None;
        }

        let url = self.pending.pop_front()?;
        self.queued.remove(url.as_str());
        self.visited.insert(url.as_str().to_string());
        self.discovered += 1;
        self.in_flight += 1;
        Some(url)
    }

    /// Mark one URL returned by [`next`](Self::next) as fully processed.
    pub fn complete(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Whether the page budget has been spent.
    pub fn budget_reached(&self) -> bool {
        self.budget.is_some_and(|budget| self.discovered >= budget)
    }

    /// No URL will be handed out any more.
    pub fn is_done(&self) -> bool {
        self.pending.is_empty() || self.budget_reached()
    }

    /// Done, and no in-flight page can seed further work.
    pub fn is_exhausted(&self) -> bool {
        self.is_done() && (self.budget_reached() || self.in_flight == 0)
    }

    /// URLs admitted into the visited set so far.
    pub fn discovered(&self) -> usize {
        self.discovered
    }

    /// URLs waiting to be fetched.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the canonical form of `url` has been visited.
    pub fn is_visited(&self, url: &Url) -> bool {
        normalize_url(url.clone())
            .map(|u| self.visited.contains(u.as_str()))
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// SharedFrontier
// ---------------------------------------------------------------------------

/// A [`FrontierState`] shared by concurrent workers.
///
/// Workers that find the queue empty while others are still fetching wait on a
/// [`Notify`] instead of exiting, since those fetches may seed more URLs.
#[derive(Debug, Clone)]
pub struct SharedFrontier {
    state: Arc<Mutex<FrontierState>>,
    notify: Arc<Notify>,
}

impl SharedFrontier {
    /// Wrap an already-seeded state.
    pub fn new(state: FrontierState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Seed several URLs under one lock. Returns how many were queued.
    pub async fn seed_all(&self, urls: impl IntoIterator<Item = Url>) -> usize {
        let queued = {
            let mut state = self.state.lock().await;
            urls.into_iter().map(|url| state.seed(url)).filter(|queued| *queued).count()
        };
        if queued > 0 {
            self.notify.notify_waiters();
        }
        queued
    }

    /// Wait for the next URL to fetch, or `None` when the crawl is over.
    pub async fn acquire(&self) -> Option<Lease> {
        loop {
            let notified = {
                let mut state = self.state.lock().await;
                if let Some(url) = state.next() {
                    return Some(Lease {
                        url,
                        frontier: Some(self.clone()),
                    });
                }
                if state.is_exhausted() {
                    return None;
                }
                // Registered before the lock is released, so no wakeup is missed.
                self.notify.notified()
            };
            notified.await;
        }
    }

    /// Seed URLs found on a processed page and mark that page complete.
    async fn finish(&self, found: Vec<Url>) {
        {
            let mut state = self.state.lock().await;
            for url in found {
                state.seed(url);
            }
            state.complete();
            trace!(pending = state.pending_len(), "page complete");
        }
        self.notify.notify_waiters();
    }

    /// URLs admitted into the visited set so far.
    pub async fn discovered(&self) -> usize {
        self.state.lock().await.discovered()
    }
}

// ---------------------------------------------------------------------------
// Lease
// ---------------------------------------------------------------------------

/// One URL handed out by [`SharedFrontier::acquire`].
///
/// The page stays in flight until [`finish`](Self::finish) is called. A lease
/// dropped without finishing (a panicking worker) still completes the page with
/// no links, so waiting workers are released.
#[derive(Debug)]
pub struct Lease {
    url: Url,
    frontier: Option<SharedFrontier>,
}

impl Lease {
    /// The URL to fetch.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Seed the links found on this page and mark it complete.
    pub async fn finish(mut self, found: Vec<Url>) {
        if let Some(frontier) = self.frontier.take() {
            frontier.finish(found).await;
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let Some(frontier) = self.frontier.take() else {
            return;
        };
        debug!(url = %self.url, "lease dropped before finishing");
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { frontier.finish(Vec::new()).await });
            }
            Err(_) => {
                if let Ok(mut state) = frontier.state.try_lock() {
                    state.complete();
                }
                frontier.notify.notify_waiters();
            }
        }
    }
}
