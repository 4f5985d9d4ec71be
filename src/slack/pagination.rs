//! Cursor-based page walking.
//!
//! Every listing endpoint we use (`conversations.list`,
//! `conversations.history`, `users.list`) returns a batch of items plus an
//! optional continuation cursor. [`collect_pages`] walks those pages
//! sequentially and never propagates a failure: it reports it alongside the
//! items gathered so far and lets the caller decide what a failure means.

use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use tracing::{debug, warn};

/// One page of results from a paginated call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the following page; `None` on the last page.
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Build a page, treating an empty or blank cursor as the end of the walk.
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self {
            items,
            next_cursor: next_cursor.filter(|c| !c.trim().is_empty()),
        }
    }
}

/// Why a page walk stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    /// Pages successfully fetched before the failing call.
    pub pages_completed: usize,
    pub reason: String,
}

/// Outcome of a page walk: the items collected and, if the walk was cut
/// short, the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub items: Vec<T>,
    pub failure: Option<FetchFailure>,
}

impl<T> Fetched<T> {
    /// All items if the walk completed, otherwise the failure.
    ///
    /// Used where partial data is worse than none (a single channel's history).
    pub fn into_complete(self) -> Result<Vec<T>, FetchFailure> {
        match self.failure {
            None => Ok(self.items),
            Some(failure) => Err(failure),
        }
    }
}

/// Walk a paginated call until the cursor runs out.
///
/// `fetch` receives `None` for the first page and the previous page's
/// cursor afterwards. A cursor that was already sent earlier in the walk
/// ends it, so a server that cycles between cursors cannot loop forever.
pub async fn collect_pages<T, E, F, Fut>(label: &str, mut fetch: F) -> Fetched<T>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
    E: Display,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut sent: HashSet<String> = HashSet::new();
    let mut pages = 0usize;

    loop {
        let page = match fetch(cursor.clone()).await {
            Ok(page) => page,
            Err(e) => {
                return Fetched {
                    items,
                    failure: Some(FetchFailure {
                        pages_completed: pages,
                        reason: e.to_string(),
                    }),
                };
            }
        };

        pages += 1;
        items.extend(page.items);

        match page.next_cursor {
            Some(next) if !sent.insert(next.clone()) => {
                warn!("{}: cursor {:?} repeated after {} pages, stopping", label, next, pages);
                break;
            }
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    debug!("{}: {} items across {} pages", label, items.len(), pages);

    Fetched {
        items,
        failure: None,
    }
}
