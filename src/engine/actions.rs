//! Host intents: navigation, search input, pagination, visibility,
//! mutations, compose, and the periodic tick.

use std::sync::Arc;
use std::time::Instant;

use crate::cache::{CacheTarget, ThreadsKey};
use crate::draft::{self, DraftForm, SaveAction};
use crate::error::{Error, Result};
use crate::invalidate::{self, MutationEffect};
use crate::model::{Flag, MailboxId, MessageId, ThreadId};
use crate::selection::{SelectionAction, ThreadsView};
use crate::transport::MailTransport;

use super::{Engine, Notice, PendingSend, TransportEvent};

impl<T: MailTransport> Engine<T> {
    /// Tell the engine what the host's navigation currently addresses. Safe
    /// to call on every route change; fetches are only issued for data the
    /// cache does not already hold.
    pub fn navigate(&mut self, mailbox_id: Option<MailboxId>, thread_id: Option<ThreadId>) {
        tracing::debug!(?mailbox_id, ?thread_id, "navigation intent");
        self.nav_mailbox = mailbox_id;
        self.nav_thread = thread_id;
        if self.cache.mailboxes().is_none() {
            self.spawn_mailboxes();
        }
        self.resolve_now();
    }

    /// Record a keystroke's worth of query text. The committed filter (and
    /// any cache reset) follows after the quiet window, in [`Engine::tick`].
    pub fn search_input(&mut self, text: &str) {
        self.search.input(text, Instant::now());
    }

    /// Request the next page of the current thread collection. A no-op
    /// while a page fetch is already in flight or past the collection end;
    /// after a failed page this retries the same page.
    pub fn load_next_threads(&mut self) {
        let Some(key) = self.current_threads_key() else {
            return;
        };
        let next = match self.cache.threads(&key) {
            Some(read) => read.value.next_page_to_request(),
            None => Some(1),
        };
        if let Some(page) = next {
            self.start_threads_fetch(key, page);
        }
    }

    /// Refetch the selected thread's message list on explicit user action.
    pub fn retry_messages(&mut self) {
        if let Some(thread_id) = self.selection().thread.selected_id()
            && self.messages_loading_thread != Some(thread_id)
        {
            self.spawn_messages(thread_id);
        }
    }

    /// A message element became visible. Queued for the debounced
    /// mark-as-read flush; duplicates collapse.
    pub fn mark_visible(&mut self, id: MessageId) {
        self.readmarks.mark_visible(id, Instant::now());
    }

    /// Flip a flag on threads and/or messages (trash, unread toggles). The
    /// result arrives as an event; on success the affected cache entries go
    /// stale and refetch.
    pub fn set_flag(
        &mut self,
        flag: Flag,
        value: bool,
        thread_ids: Vec<ThreadId>,
        message_ids: Vec<MessageId>,
    ) {
        let Some(mailbox_id) = self.selection().mailbox_id else {
            return;
        };
        self.mutation_error = None;
        let mut affected = thread_ids.clone();
        affected.extend(self.threads_for_messages(&message_ids));
        affected.sort_unstable();
        affected.dedup();
        let effect = MutationEffect::FlagChanged {
            flag,
            mailbox_id,
            thread_ids: affected,
        };
        let transport = Arc::clone(&self.transport);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = transport
                .set_flag(flag, value, &thread_ids, &message_ids)
                .await;
            let _ = tx.send(TransportEvent::FlagDone { effect, result });
        });
    }

    /// Persist the compose form. Clean forms are a no-op; a sender change
    /// runs the delete-then-recreate transfer. Errors are returned for the
    /// compose surface and leave the session retryable.
    pub async fn save_draft(&mut self, form: &DraftForm) -> Result<()> {
        match self.compose.begin_save(form) {
            SaveAction::Nothing => Ok(()),
            SaveAction::Create => match self.transport.create_draft(form).await {
                Ok(draft) => {
                    self.compose.on_created(draft, form);
                    self.apply_effect(&MutationEffect::DraftChanged {
                        mailbox_id: form.mailbox_id,
                    });
                    Ok(())
                }
                Err(error) => {
                    self.compose.on_save_failed();
                    self.fail(error)
                }
            },
            SaveAction::Update(id) => match self.transport.update_draft(id, form).await {
                Ok(draft) => {
                    self.compose.on_updated(draft, form);
                    self.apply_effect(&MutationEffect::DraftChanged {
                        mailbox_id: form.mailbox_id,
                    });
                    Ok(())
                }
                Err(error) => {
                    self.compose.on_save_failed();
                    self.fail(error)
                }
            },
            SaveAction::Transfer { delete } => {
                if let Err(error) = self.transport.delete_draft(delete).await {
                    // Old draft still exists; the next save retries the
                    // whole transfer.
                    self.compose.on_save_failed();
                    return self.fail(error);
                }
                self.compose.on_transfer_deleted();
                match self.transport.create_draft(form).await {
                    Ok(draft) => {
                        tracing::debug!(draft_id = draft.id, "draft transferred to new sender");
                        self.compose.on_created(draft, form);
                        self.apply_effect(&MutationEffect::DraftChanged {
                            mailbox_id: form.mailbox_id,
                        });
                        Ok(())
                    }
                    Err(error) => {
                        // Deleted but not recreated: drop to unsaved-new so
                        // the stale id is never referenced; the form content
                        // stays with the caller.
                        tracing::warn!(error = %error, "draft transfer create failed");
                        self.compose.on_transfer_create_failed();
                        self.fail(error)
                    }
                }
            }
        }
    }

    /// Validate, force a save if the form is dirty, then fire the send
    /// mutation with the saved draft's identity. The send itself is
    /// asynchronous; completion is polled in [`Engine::tick`].
    pub async fn send(&mut self, form: &DraftForm) -> Result<()> {
        draft::validate_for_send(form)?;
        if self.compose.draft_id().is_none() || self.compose.is_dirty(form) {
            self.save_draft(form).await?;
        }
        let Some(draft_id) = self.compose.draft_id() else {
            return Err(Error::Validation("draft was not saved".to_string()));
        };
        let html = form.html.clone().unwrap_or_default();
        let receipt = match self.transport.send_message(draft_id, &html, &form.text).await {
            Ok(receipt) => receipt,
            // The draft survives; the user can retry without re-typing.
            Err(error) => return self.fail(error),
        };
        tracing::debug!(task_id = %receipt.task_id, "send accepted");
        self.pending_send = Some(PendingSend {
            task_id: receipt.task_id,
            mailbox_id: form.mailbox_id,
            thread_id: self.compose.draft().map(|d| d.thread_id),
            attempts: 0,
            next_poll: Instant::now() + self.config.send_poll(),
            polling: false,
        });
        Ok(())
    }

    /// Drive the timers: read-mark flush, search commit, mailbox polling,
    /// and send status polling. The host calls this from its own loop.
    pub fn tick(&mut self, now: Instant) {
        if self.readmarks.due(now) {
            let ids = self.readmarks.begin_flush();
            self.spawn_read_mark_flush(ids);
        }

        if self.search.due(now)
            && let Some(filter) = self.search.commit()
        {
            tracing::debug!(query = %filter.serialize(), "search filter committed");
            // Entries for superseded queries are gone; folder views stay.
            self.cache.evict_search_threads();
            self.resolve_now();
        }

        let mailbox_poll_due = self
            .last_mailbox_fetch
            .is_some_and(|at| now.duration_since(at) >= self.config.mailbox_poll());
        if mailbox_poll_due {
            self.spawn_mailboxes();
        }

        self.poll_pending_send(now);
    }

    /// Re-derive the selection from the cache and act on what it implies.
    /// Runs after navigation changes and after every relevant event. Before
    /// the first mailbox fetch lands there is nothing to derive from, and a
    /// not-yet-fetched collection must not be mistaken for the terminal
    /// empty one.
    pub(crate) fn resolve_now(&mut self) {
        if self.cache.mailboxes().is_none() {
            return;
        }
        let mailboxes = self.mailboxes();
        let key = self.current_threads_key();
        let read = key.as_ref().and_then(|k| self.cache.threads(k));
        let flattened = read
            .as_ref()
            .map(|r| (r.value.flattened(), r.value.end_reached()));
        let view = flattened.as_ref().map(|(threads, end_reached)| ThreadsView {
            threads,
            end_reached: *end_reached,
        });

        let resolution = self
            .resolver
            .resolve(self.nav_mailbox, self.nav_thread, &mailboxes, view);
        for action in resolution.actions {
            match action {
                SelectionAction::Redirect {
                    mailbox_id,
                    thread_id,
                } => {
                    // Adopt the corrected ids; the host mirrors them.
                    self.nav_mailbox = mailbox_id;
                    self.nav_thread = thread_id;
                    self.push_notice(Notice::NavigateReplace {
                        mailbox_id,
                        thread_id,
                    });
                }
                SelectionAction::LoadMoreThreads => self.load_next_threads(),
                SelectionAction::RefreshMessages(thread_id) => {
                    self.cache.invalidate(&CacheTarget::Messages(thread_id));
                    self.spawn_messages(thread_id);
                }
            }
        }
        self.ensure_current_data();
    }

    /// Issue whatever fetches the current selection still needs.
    fn ensure_current_data(&mut self) {
        let Some(key) = self.current_threads_key() else {
            return;
        };
        match self.cache.threads(&key) {
            None => self.start_threads_fetch(key.clone(), 1),
            Some(read) => {
                // Also covers an entry whose only fetch was discarded as
                // superseded: present but without pages. Latched errors are
                // not retried here; retry waits for an explicit user action.
                let set = &read.value;
                if !set.has_in_flight()
                    && set.error().is_none()
                    && (read.stale || set.is_empty())
                {
                    self.refetch_threads_pages(&key);
                }
            }
        }

        if let Some(thread_id) = self.selection().thread.selected_id() {
            let needs = match self.cache.messages(thread_id) {
                None => true,
                Some(read) => read.stale,
            };
            if needs && self.messages_loading_thread != Some(thread_id) {
                self.spawn_messages(thread_id);
            }
        }
    }

    /// Mark stale and kick off the refetch round for one mutation's effect.
    pub(crate) fn apply_effect(&mut self, effect: &MutationEffect) {
        for target in invalidate::targets(effect) {
            self.cache.invalidate(&target);
        }
        self.refetch_stale();
    }

    /// Refetch the stale entries that are currently on screen; everything
    /// else refetches lazily when it becomes current again.
    fn refetch_stale(&mut self) {
        if self.cache.is_mailboxes_stale() {
            self.spawn_mailboxes();
        }
        if let Some(key) = self.current_threads_key()
            && self.cache.is_threads_stale(&key)
            && let Some(read) = self.cache.threads(&key)
            && !read.value.has_in_flight()
        {
            self.refetch_threads_pages(&key);
        }
        if let Some(thread_id) = self.selection().thread.selected_id()
            && self.cache.is_messages_stale(thread_id)
            && self.messages_loading_thread != Some(thread_id)
        {
            self.spawn_messages(thread_id);
        }
    }

    /// Begin one page fetch, recording the in-flight marker in the cached
    /// page set so concurrent `loadNext` calls coalesce.
    fn start_threads_fetch(&mut self, key: ThreadsKey, page: u32) {
        let mut set = self
            .cache
            .threads(&key)
            .map(|read| read.value.as_ref().clone())
            .unwrap_or_default();
        set.begin(page);
        self.cache.stage_threads(key.clone(), set);
        self.spawn_threads_page(key, page);
    }

    /// Refetch every page the collection already holds, as one batch. Old
    /// data keeps rendering until the fresh pages land.
    fn refetch_threads_pages(&mut self, key: &ThreadsKey) {
        let Some(read) = self.cache.threads(key) else {
            return;
        };
        let pages = read.value.fetched_pages();
        if pages.is_empty() {
            self.start_threads_fetch(key.clone(), 1);
            return;
        }
        let mut set = read.value.as_ref().clone();
        for page in &pages {
            set.begin(*page);
        }
        self.cache.stage_threads(key.clone(), set);

        let filter = self.search.committed().clone();
        let transport = Arc::clone(&self.transport);
        let tx = self.events_tx.clone();
        let key = key.clone();
        let mailbox_id = key.mailbox_id;
        tokio::spawn(async move {
            let fetches = pages.into_iter().map(|page| {
                let transport = Arc::clone(&transport);
                let filter = filter.clone();
                async move {
                    let result = transport.list_threads(mailbox_id, &filter, page).await;
                    (page, result)
                }
            });
            for (page, result) in futures::future::join_all(fetches).await {
                let _ = tx.send(TransportEvent::ThreadsPage {
                    key: key.clone(),
                    page,
                    result,
                });
            }
        });
    }

    fn spawn_mailboxes(&mut self) {
        if self.mailboxes_loading {
            return;
        }
        self.mailboxes_loading = true;
        self.last_mailbox_fetch = Some(Instant::now());
        let transport = Arc::clone(&self.transport);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = transport.list_mailboxes().await;
            let _ = tx.send(TransportEvent::Mailboxes { result });
        });
    }

    fn spawn_threads_page(&mut self, key: ThreadsKey, page: u32) {
        let filter = self.search.committed().clone();
        let transport = Arc::clone(&self.transport);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = transport.list_threads(key.mailbox_id, &filter, page).await;
            let _ = tx.send(TransportEvent::ThreadsPage { key, page, result });
        });
    }

    fn spawn_messages(&mut self, thread_id: ThreadId) {
        self.messages_loading_thread = Some(thread_id);
        self.messages_error = None;
        let transport = Arc::clone(&self.transport);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = transport.list_messages(thread_id).await;
            let _ = tx.send(TransportEvent::Messages { thread_id, result });
        });
    }

    fn spawn_read_mark_flush(&mut self, ids: Vec<MessageId>) {
        tracing::debug!(count = ids.len(), "flushing read marks");
        let transport = Arc::clone(&self.transport);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = transport.set_flag(Flag::Unread, false, &[], &ids).await;
            let _ = tx.send(TransportEvent::ReadMarkDone { ids, result });
        });
    }

    fn poll_pending_send(&mut self, now: Instant) {
        let Some(send) = self.pending_send.as_mut() else {
            return;
        };
        if send.polling || now < send.next_poll {
            return;
        }
        send.polling = true;
        let task_id = send.task_id.clone();
        let transport = Arc::clone(&self.transport);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = transport.send_status(&task_id).await;
            let _ = tx.send(TransportEvent::SendPolled { task_id, result });
        });
    }
}
