//! Ordered accumulation of numbered result pages.
//!
//! One [`PageSet`] per thread cache key. Pages land in the slot of the page
//! number they were requested with, so late arrivals never reorder the
//! collection, and the flattened view concatenates results in page order
//! while dropping duplicate ids.

use std::collections::HashSet;

use crate::error::Error;
use crate::model::{Page, Thread};

/// Stable identity used to de-duplicate across pages.
pub trait Identified {
    fn ident(&self) -> i64;
}

impl Identified for Thread {
    fn ident(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone)]
pub struct PageSet<T> {
    /// Slot index = page number - 1; `None` until that page arrives.
    pages: Vec<Option<Page<T>>>,
    /// Page numbers currently being fetched.
    in_flight: HashSet<u32>,
    /// Last fetch failure; cleared when any page lands.
    error: Option<Error>,
}

impl<T> Default for PageSet<T> {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            in_flight: HashSet::new(),
            error: None,
        }
    }
}

impl<T: Clone + Identified> PageSet<T> {
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            in_flight: HashSet::new(),
            error: None,
        }
    }

    /// The page number a `loadNext` should request, or `None` when a fetch
    /// is already in flight or the collection end has been reached.
    pub fn next_page_to_request(&self) -> Option<u32> {
        if !self.in_flight.is_empty() {
            return None;
        }
        match self.highest_fetched() {
            None => Some(1),
            Some(page) => page.next,
        }
    }

    /// Mark a page request as issued.
    pub fn begin(&mut self, page: u32) {
        self.in_flight.insert(page);
    }

    pub fn has_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Store a fetched page in its requested slot, regardless of arrival
    /// order relative to other in-flight pages.
    pub fn record(&mut self, page: u32, result: Page<T>) {
        if page == 0 {
            return;
        }
        let idx = (page - 1) as usize;
        if self.pages.len() <= idx {
            self.pages.resize_with(idx + 1, || None);
        }
        self.pages[idx] = Some(result);
        self.in_flight.remove(&page);
        self.error = None;
    }

    /// A failed page fetch leaves prior pages intact and latches the error.
    pub fn record_failure(&mut self, page: u32, error: Error) {
        self.in_flight.remove(&page);
        self.error = Some(error);
    }

    /// Forget an outstanding request without recording anything, used when
    /// its response was discarded as superseded.
    pub fn clear_in_flight(&mut self, page: u32) {
        self.in_flight.remove(&page);
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Concatenate results across fetched pages in page order, dropping
    /// duplicate ids (a row can shift between pages while paginating).
    pub fn flattened(&self) -> Vec<T> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for page in self.pages.iter().flatten() {
            for item in &page.results {
                if seen.insert(item.ident()) {
                    out.push(item.clone());
                }
            }
        }
        out
    }

    /// Total count as reported by the most authoritative (highest) page.
    pub fn count(&self) -> Option<u32> {
        self.highest_fetched().map(|page| page.count)
    }

    /// True once the final page has been fetched.
    pub fn end_reached(&self) -> bool {
        self.highest_fetched().is_some_and(|page| page.next.is_none())
    }

    /// Page numbers that have been fetched so far, ascending.
    pub fn fetched_pages(&self) -> Vec<u32> {
        self.pages
            .iter()
            .enumerate()
            .filter_map(|(idx, page)| page.as_ref().map(|_| idx as u32 + 1))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(Option::is_none)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.find(id).is_some()
    }

    pub fn find(&self, id: i64) -> Option<&T> {
        self.pages
            .iter()
            .flatten()
            .flat_map(|page| page.results.iter())
            .find(|item| item.ident() == id)
    }

    fn highest_fetched(&self) -> Option<&Page<T>> {
        self.pages.iter().rev().flatten().next()
    }
}
