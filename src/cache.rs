//! Keyed in-memory resource store with explicit staleness.
//!
//! The cache exclusively owns the stored mailbox/thread/message collections;
//! consumers get `Arc` snapshots plus a staleness flag. Invalidation only
//! marks entries stale so a consumer holding a snapshot keeps rendering the
//! old value while the refetch is outstanding; writers build a fresh value
//! and swap the `Arc`, never mutating a stored payload in place.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::model::{Mailbox, MailboxId, MessageList, Thread, ThreadId};
use crate::paginate::PageSet;
use crate::search::{Filter, FilterSignature};

/// Key of a cached thread collection: one mailbox viewed through one filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadsKey {
    pub mailbox_id: MailboxId,
    pub filter: FilterSignature,
    /// Whether the filter narrows beyond a bare folder view. Search-scoped
    /// entries are the ones reset when the committed query changes.
    pub search: bool,
}

impl ThreadsKey {
    pub fn new(mailbox_id: MailboxId, filter: &Filter) -> Self {
        Self {
            mailbox_id,
            filter: filter.signature(),
            search: filter.is_search(),
        }
    }
}

/// What to invalidate after a mutation: exact keys or prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheTarget {
    /// The mailbox list, including its unread/draft counters.
    Mailboxes,
    /// One thread collection.
    Threads(ThreadsKey),
    /// Every thread collection of one mailbox, any filter.
    MailboxThreads(MailboxId),
    /// The message list of one thread.
    Messages(ThreadId),
}

#[derive(Debug)]
struct Slot<T> {
    value: Option<Arc<T>>,
    stale: bool,
    fetched_at: Option<Instant>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            value: None,
            stale: false,
            fetched_at: None,
        }
    }
}

impl<T> Slot<T> {
    fn put(&mut self, value: T, now: Instant) {
        self.value = Some(Arc::new(value));
        self.stale = false;
        self.fetched_at = Some(now);
    }

    fn read(&self) -> Option<CacheRead<T>> {
        self.value.as_ref().map(|value| CacheRead {
            value: Arc::clone(value),
            stale: self.stale,
            fetched_at: self.fetched_at,
        })
    }

    fn invalidate(&mut self) {
        if self.value.is_some() {
            self.stale = true;
        }
    }

    /// Swap the value without touching staleness, for bookkeeping updates
    /// (in-flight markers) that are not fresh data.
    fn replace(&mut self, value: T) {
        self.value = Some(Arc::new(value));
    }
}

/// A snapshot out of the cache: the stored value plus its staleness.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    pub value: Arc<T>,
    pub stale: bool,
    /// When the value last landed from the server; `None` for entries that
    /// only carry bookkeeping so far.
    pub fetched_at: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct ResourceCache {
    mailboxes: Slot<Vec<Mailbox>>,
    threads: HashMap<ThreadsKey, Slot<PageSet<Thread>>>,
    messages: HashMap<ThreadId, Slot<MessageList>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mailboxes(&self) -> Option<CacheRead<Vec<Mailbox>>> {
        self.mailboxes.read()
    }

    pub fn put_mailboxes(&mut self, list: Vec<Mailbox>, now: Instant) {
        self.mailboxes.put(list, now);
    }

    pub fn threads(&self, key: &ThreadsKey) -> Option<CacheRead<PageSet<Thread>>> {
        self.threads.get(key).and_then(Slot::read)
    }

    pub fn put_threads(&mut self, key: ThreadsKey, set: PageSet<Thread>, now: Instant) {
        self.threads.entry(key).or_default().put(set, now);
    }

    /// Update a thread collection's bookkeeping (in-flight markers, latched
    /// errors) without claiming fresh data: staleness is preserved.
    pub fn stage_threads(&mut self, key: ThreadsKey, set: PageSet<Thread>) {
        self.threads.entry(key).or_default().replace(set);
    }

    pub fn messages(&self, thread_id: ThreadId) -> Option<CacheRead<MessageList>> {
        self.messages.get(&thread_id).and_then(Slot::read)
    }

    pub fn put_messages(&mut self, thread_id: ThreadId, list: MessageList, now: Instant) {
        self.messages.entry(thread_id).or_default().put(list, now);
    }

    /// Mark the targeted entries stale. Displayed data is untouched; the
    /// refetch is a separate asynchronous step.
    pub fn invalidate(&mut self, target: &CacheTarget) {
        match target {
            CacheTarget::Mailboxes => self.mailboxes.invalidate(),
            CacheTarget::Threads(key) => {
                if let Some(slot) = self.threads.get_mut(key) {
                    slot.invalidate();
                }
            }
            CacheTarget::MailboxThreads(mailbox_id) => {
                for (key, slot) in self.threads.iter_mut() {
                    if key.mailbox_id == *mailbox_id {
                        slot.invalidate();
                    }
                }
            }
            CacheTarget::Messages(thread_id) => {
                if let Some(slot) = self.messages.get_mut(thread_id) {
                    slot.invalidate();
                }
            }
        }
    }

    pub fn is_mailboxes_stale(&self) -> bool {
        self.mailboxes.stale
    }

    pub fn is_threads_stale(&self, key: &ThreadsKey) -> bool {
        self.threads.get(key).is_some_and(|slot| slot.stale)
    }

    pub fn is_messages_stale(&self, thread_id: ThreadId) -> bool {
        self.messages.get(&thread_id).is_some_and(|slot| slot.stale)
    }

    /// Drop every search-scoped thread collection. Used when the committed
    /// query changes; baseline folder views are untouched.
    pub fn evict_search_threads(&mut self) {
        self.threads.retain(|key, _| !key.search);
    }

    /// Drop one thread's message list outright (e.g. the thread is gone).
    pub fn evict_messages(&mut self, thread_id: ThreadId) {
        self.messages.remove(&thread_id);
    }

    /// Find which thread a cached message belongs to.
    pub fn thread_of_message(&self, message_id: crate::model::MessageId) -> Option<ThreadId> {
        self.messages.iter().find_map(|(thread_id, slot)| {
            let list = slot.value.as_ref()?;
            list.results
                .iter()
                .any(|m| m.id == message_id)
                .then_some(*thread_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Page;

    fn thread(id: i64) -> Thread {
        Thread {
            id,
            subject: "s".to_string(),
            count_messages: 1,
            count_unread: 0,
            count_trashed: 0,
            activity_at: chrono::Utc::now(),
            sender_names: Vec::new(),
            labels: Vec::new(),
        }
    }

    fn one_page_set(ids: &[i64]) -> PageSet<Thread> {
        let mut set = PageSet::new();
        set.record(
            1,
            Page {
                results: ids.iter().copied().map(thread).collect(),
                count: ids.len() as u32,
                next: None,
                previous: None,
            },
        );
        set
    }

    #[test]
    fn invalidation_marks_stale_without_dropping_data() {
        let mut cache = ResourceCache::new();
        let key = ThreadsKey::new(1, &Filter::default());
        cache.put_threads(key.clone(), one_page_set(&[10, 11]), Instant::now());

        cache.invalidate(&CacheTarget::Threads(key.clone()));

        let read = cache.threads(&key).expect("entry still present");
        assert!(read.stale);
        assert_eq!(read.value.flattened().len(), 2);
    }

    #[test]
    fn snapshot_survives_replacement() {
        let mut cache = ResourceCache::new();
        let key = ThreadsKey::new(1, &Filter::default());
        cache.put_threads(key.clone(), one_page_set(&[10]), Instant::now());

        let before = cache.threads(&key).unwrap();
        cache.put_threads(key.clone(), one_page_set(&[10, 11]), Instant::now());

        // The old snapshot is untouched; the new read sees the new value.
        assert_eq!(before.value.flattened().len(), 1);
        let after = cache.threads(&key).unwrap();
        assert_eq!(after.value.flattened().len(), 2);
        assert!(!after.stale);
    }

    #[test]
    fn mailbox_prefix_invalidates_every_filter() {
        let mut cache = ResourceCache::new();
        let inbox = ThreadsKey::new(1, &Filter::default());
        let search = ThreadsKey::new(1, &Filter::parse("is:unread"));
        let other_mailbox = ThreadsKey::new(2, &Filter::default());
        let now = Instant::now();
        cache.put_threads(inbox.clone(), one_page_set(&[1]), now);
        cache.put_threads(search.clone(), one_page_set(&[1]), now);
        cache.put_threads(other_mailbox.clone(), one_page_set(&[2]), now);

        cache.invalidate(&CacheTarget::MailboxThreads(1));

        assert!(cache.is_threads_stale(&inbox));
        assert!(cache.is_threads_stale(&search));
        assert!(!cache.is_threads_stale(&other_mailbox));
    }

    #[test]
    fn search_eviction_spares_folder_views() {
        let mut cache = ResourceCache::new();
        let inbox = ThreadsKey::new(1, &Filter::default());
        let search = ThreadsKey::new(1, &Filter::parse("invoice"));
        let now = Instant::now();
        cache.put_threads(inbox.clone(), one_page_set(&[1]), now);
        cache.put_threads(search.clone(), one_page_set(&[1]), now);

        cache.evict_search_threads();

        assert!(cache.threads(&inbox).is_some());
        assert!(cache.threads(&search).is_none());
    }

    #[test]
    fn refetch_clears_staleness() {
        let mut cache = ResourceCache::new();
        cache.put_mailboxes(Vec::new(), Instant::now());
        cache.invalidate(&CacheTarget::Mailboxes);
        assert!(cache.is_mailboxes_stale());
        cache.put_mailboxes(Vec::new(), Instant::now());
        assert!(!cache.is_mailboxes_stale());
    }

    #[test]
    fn invalidating_an_absent_entry_is_a_no_op() {
        let mut cache = ResourceCache::new();
        cache.invalidate(&CacheTarget::Messages(42));
        assert!(cache.messages(42).is_none());
        assert!(!cache.is_messages_stale(42));
    }
}
