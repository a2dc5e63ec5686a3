//! Engine facade.
//!
//! Owns the resource cache and every component's state, and is the single
//! writer of all of it. Host intents come in through the methods in
//! `actions`; transport work runs on spawned tasks whose results flow back
//! through an event channel and are applied in `events`. All state changes
//! happen synchronously between awaits, so invariants are re-checked at each
//! event application instead of assumed from request order.

mod actions;
mod events;

pub use events::TransportEvent;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::cache::{ResourceCache, ThreadsKey};
use crate::config::EngineConfig;
use crate::draft::DraftSession;
use crate::error::Error;
use crate::model::{Mailbox, MailboxId, Message, MessageId, Thread, ThreadId};
use crate::readmark::ReadMarkTracker;
use crate::search::SearchNormalizer;
use crate::selection::{SelectionResolver, SelectionState};
use crate::transport::MailTransport;

/// Loading/error status of one displayed resource.
#[derive(Debug, Clone, Default)]
pub struct ResourceStatus {
    pub loading: bool,
    pub error: Option<Error>,
}

/// Host-facing notifications the engine cannot act on itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Replace the navigation state with these ids (the addressed ones did
    /// not survive resolution).
    NavigateReplace {
        mailbox_id: Option<MailboxId>,
        thread_id: Option<ThreadId>,
    },
    /// The backend rejected the session; the host must log out.
    AuthRequired,
    /// The asynchronous send settled.
    SendSucceeded,
    SendFailed(Error),
}

/// Flattened view of the current thread collection.
#[derive(Debug, Clone, Default)]
pub struct ThreadsSnapshot {
    pub threads: Vec<Thread>,
    pub count: Option<u32>,
    pub end_reached: bool,
    pub stale: bool,
}

/// The selected thread's message list.
#[derive(Debug, Clone, Default)]
pub struct MessagesSnapshot {
    pub messages: Vec<Message>,
    pub stale: bool,
}

/// An asynchronous send being polled to completion.
#[derive(Debug)]
struct PendingSend {
    task_id: String,
    mailbox_id: MailboxId,
    thread_id: Option<ThreadId>,
    attempts: u32,
    next_poll: Instant,
    polling: bool,
}

pub struct Engine<T: MailTransport> {
    transport: Arc<T>,
    config: EngineConfig,
    cache: ResourceCache,
    resolver: SelectionResolver,
    readmarks: ReadMarkTracker,
    search: SearchNormalizer,
    compose: DraftSession,
    pending_send: Option<PendingSend>,

    /// Navigation intent as last told by the host (or adopted from a
    /// redirect the host was asked to perform).
    nav_mailbox: Option<MailboxId>,
    nav_thread: Option<ThreadId>,

    mailboxes_loading: bool,
    mailboxes_error: Option<Error>,
    last_mailbox_fetch: Option<Instant>,
    messages_loading_thread: Option<ThreadId>,
    messages_error: Option<Error>,
    mutation_error: Option<Error>,
    auth_latched: bool,

    notices: Vec<Notice>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl<T: MailTransport> Engine<T> {
    pub fn new(transport: T, config: EngineConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            transport: Arc::new(transport),
            readmarks: ReadMarkTracker::new(config.read_mark_debounce()),
            search: SearchNormalizer::new(config.search_debounce()),
            config,
            cache: ResourceCache::new(),
            resolver: SelectionResolver::new(),
            compose: DraftSession::new(),
            pending_send: None,
            nav_mailbox: None,
            nav_thread: None,
            mailboxes_loading: false,
            mailboxes_error: None,
            last_mailbox_fetch: None,
            messages_loading_thread: None,
            messages_error: None,
            mutation_error: None,
            auth_latched: false,
            notices: Vec::new(),
            events_tx,
            events_rx,
        }
    }

    pub fn selection(&self) -> SelectionState {
        self.resolver.current()
    }

    /// The mailbox list as last fetched (empty until the first fetch lands).
    pub fn mailboxes(&self) -> Vec<Mailbox> {
        self.cache
            .mailboxes()
            .map(|read| read.value.as_ref().clone())
            .unwrap_or_default()
    }

    /// Flattened thread collection for the current mailbox and filter.
    pub fn threads(&self) -> ThreadsSnapshot {
        let Some(key) = self.current_threads_key() else {
            return ThreadsSnapshot::default();
        };
        match self.cache.threads(&key) {
            Some(read) => ThreadsSnapshot {
                threads: read.value.flattened(),
                count: read.value.count(),
                end_reached: read.value.end_reached(),
                stale: read.stale,
            },
            None => ThreadsSnapshot::default(),
        }
    }

    /// Message list of the selected thread, if one is selected and fetched.
    pub fn messages(&self) -> MessagesSnapshot {
        let Some(thread_id) = self.selection().thread.selected_id() else {
            return MessagesSnapshot::default();
        };
        match self.cache.messages(thread_id) {
            Some(read) => MessagesSnapshot {
                messages: read.value.results.clone(),
                stale: read.stale,
            },
            None => MessagesSnapshot::default(),
        }
    }

    /// The query text as typed, for address-bar mirroring.
    pub fn raw_query(&self) -> &str {
        self.search.raw()
    }

    pub fn mailboxes_status(&self) -> ResourceStatus {
        ResourceStatus {
            loading: self.mailboxes_loading,
            error: self.mailboxes_error.clone(),
        }
    }

    pub fn threads_status(&self) -> ResourceStatus {
        let Some(key) = self.current_threads_key() else {
            return ResourceStatus::default();
        };
        match self.cache.threads(&key) {
            Some(read) => ResourceStatus {
                loading: read.value.has_in_flight(),
                error: read.value.error().cloned(),
            },
            None => ResourceStatus::default(),
        }
    }

    pub fn messages_status(&self) -> ResourceStatus {
        let selected = self.selection().thread.selected_id();
        ResourceStatus {
            loading: selected.is_some() && self.messages_loading_thread == selected,
            error: self.messages_error.clone(),
        }
    }

    /// Last flag-mutation failure, for the host's toast surface.
    pub fn mutation_error(&self) -> Option<&Error> {
        self.mutation_error.as_ref()
    }

    pub fn send_in_flight(&self) -> bool {
        self.pending_send.is_some()
    }

    /// Take the accumulated host notifications.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Cache key of the thread collection currently on screen.
    fn current_threads_key(&self) -> Option<ThreadsKey> {
        let mailboxes = self.mailboxes();
        self.effective_mailbox(&mailboxes)
            .map(|id| ThreadsKey::new(id, self.search.committed()))
    }

    /// Same fallback rule the resolver applies: the addressed mailbox when
    /// it exists, otherwise the first one.
    fn effective_mailbox(&self, mailboxes: &[Mailbox]) -> Option<MailboxId> {
        self.nav_mailbox
            .filter(|id| mailboxes.iter().any(|m| m.id == *id))
            .or_else(|| mailboxes.first().map(|m| m.id))
    }

    /// Resolve message ids to the threads they belong to via cached message
    /// lists; ids without a cached home are skipped.
    fn threads_for_messages(&self, ids: &[MessageId]) -> Vec<ThreadId> {
        let mut out: Vec<ThreadId> = ids
            .iter()
            .filter_map(|id| self.cache.thread_of_message(*id))
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    fn push_notice(&mut self, notice: Notice) {
        if notice == Notice::AuthRequired {
            if self.auth_latched {
                return;
            }
            self.auth_latched = true;
        }
        self.notices.push(notice);
    }

    /// Record a failure, latching the logout notice on auth expiry.
    fn fail<V>(&mut self, error: Error) -> crate::error::Result<V> {
        if error.is_auth() {
            self.push_notice(Notice::AuthRequired);
        }
        Err(error)
    }
}
