//! Transport results, applied back into engine state.
//!
//! Spawned transport work finishes in any order; every application
//! re-checks the result against the current selection and cache keys before
//! committing, so a fetch issued for a superseded scope is discarded rather
//! than clobbering what the user is looking at now.

use std::time::Instant;

use crate::cache::ThreadsKey;
use crate::error::{Error, Result};
use crate::invalidate::MutationEffect;
use crate::model::{Flag, Mailbox, MessageId, MessageList, Page, Thread, ThreadId};
use crate::transport::{MailTransport, SendTaskState};

use super::{Engine, Notice};

/// Outcome of one spawned transport call.
#[derive(Debug)]
pub enum TransportEvent {
    Mailboxes {
        result: Result<Vec<Mailbox>>,
    },
    ThreadsPage {
        key: ThreadsKey,
        page: u32,
        result: Result<Page<Thread>>,
    },
    Messages {
        thread_id: ThreadId,
        result: Result<MessageList>,
    },
    FlagDone {
        effect: MutationEffect,
        result: Result<()>,
    },
    ReadMarkDone {
        ids: Vec<MessageId>,
        result: Result<()>,
    },
    SendPolled {
        task_id: String,
        result: Result<SendTaskState>,
    },
}

impl<T: MailTransport> Engine<T> {
    /// Drain and apply all completed transport work. Returns whether any
    /// event was applied, so the host knows to re-render.
    pub fn poll_events(&mut self) -> bool {
        let mut had_events = false;
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply_event(event);
            had_events = true;
        }
        had_events
    }

    /// Await and apply exactly one event.
    #[cfg(test)]
    pub(crate) async fn pump(&mut self) {
        if let Some(event) = self.events_rx.recv().await {
            self.apply_event(event);
        }
    }

    pub(crate) fn apply_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Mailboxes { result } => self.apply_mailboxes(result),
            TransportEvent::ThreadsPage { key, page, result } => {
                self.apply_threads_page(key, page, result)
            }
            TransportEvent::Messages { thread_id, result } => {
                self.apply_messages(thread_id, result)
            }
            TransportEvent::FlagDone { effect, result } => self.apply_flag_done(effect, result),
            TransportEvent::ReadMarkDone { ids, result } => self.apply_read_mark_done(ids, result),
            TransportEvent::SendPolled { task_id, result } => {
                self.apply_send_poll(task_id, result)
            }
        }
    }

    fn apply_mailboxes(&mut self, result: Result<Vec<Mailbox>>) {
        self.mailboxes_loading = false;
        match result {
            Ok(list) => {
                tracing::debug!(count = list.len(), "mailbox list refreshed");
                self.mailboxes_error = None;
                self.cache.put_mailboxes(list, Instant::now());
                self.resolve_now();
            }
            Err(error) => {
                tracing::warn!(error = %error, "mailbox fetch failed");
                if error.is_auth() {
                    self.push_notice(Notice::AuthRequired);
                }
                self.mailboxes_error = Some(error);
            }
        }
    }

    fn apply_threads_page(&mut self, key: ThreadsKey, page: u32, result: Result<Page<Thread>>) {
        if self.current_threads_key().as_ref() != Some(&key) {
            // Issued for a scope the user has left; do not commit it.
            tracing::debug!(page, mailbox = key.mailbox_id, "discarding superseded thread page");
            if let Some(read) = self.cache.threads(&key) {
                let mut set = read.value.as_ref().clone();
                set.clear_in_flight(page);
                self.cache.stage_threads(key, set);
            }
            return;
        }

        let mut set = self
            .cache
            .threads(&key)
            .map(|read| read.value.as_ref().clone())
            .unwrap_or_default();
        match result {
            Ok(data) => {
                tracing::debug!(page, results = data.results.len(), "thread page fetched");
                set.record(page, data);
                self.cache.put_threads(key, set, Instant::now());
                // The page may contain a pending selection, or may have
                // dropped the selected thread.
                self.resolve_now();
            }
            Err(error) => {
                tracing::warn!(page, error = %error, "thread page fetch failed");
                if error.is_auth() {
                    self.push_notice(Notice::AuthRequired);
                }
                set.record_failure(page, error);
                self.cache.stage_threads(key, set);
            }
        }
    }

    fn apply_messages(&mut self, thread_id: ThreadId, result: Result<MessageList>) {
        if self.messages_loading_thread == Some(thread_id) {
            self.messages_loading_thread = None;
        }
        let selected = self.selection().thread.selected_id();
        if selected != Some(thread_id) {
            tracing::debug!(thread_id, "discarding messages for deselected thread");
            return;
        }
        match result {
            Ok(list) => {
                tracing::debug!(thread_id, count = list.count, "message list fetched");
                self.messages_error = None;
                self.cache.put_messages(thread_id, list, Instant::now());
            }
            Err(error) if error.is_not_found() => {
                // The thread vanished server-side; fall back to no
                // selection instead of surfacing a crash.
                tracing::debug!(thread_id, "thread gone, clearing selection");
                self.cache.evict_messages(thread_id);
                self.nav_thread = None;
                self.resolve_now();
                self.push_notice(Notice::NavigateReplace {
                    mailbox_id: self.selection().mailbox_id,
                    thread_id: None,
                });
            }
            Err(error) => {
                tracing::warn!(thread_id, error = %error, "message fetch failed");
                if error.is_auth() {
                    self.push_notice(Notice::AuthRequired);
                }
                self.messages_error = Some(error);
            }
        }
    }

    fn apply_flag_done(&mut self, effect: MutationEffect, result: Result<()>) {
        match result {
            Ok(()) => {
                tracing::debug!(?effect, "flag mutation confirmed");
                self.apply_effect(&effect);
            }
            Err(error) => {
                tracing::warn!(error = %error, "flag mutation failed");
                if error.is_auth() {
                    self.push_notice(Notice::AuthRequired);
                }
                self.mutation_error = Some(error);
            }
        }
    }

    fn apply_read_mark_done(&mut self, ids: Vec<MessageId>, result: Result<()>) {
        match result {
            Ok(()) => {
                self.readmarks.on_flush_success();
                let thread_ids = self.threads_for_messages(&ids);
                if let Some(mailbox_id) = self.selection().mailbox_id {
                    self.apply_effect(&MutationEffect::FlagChanged {
                        flag: Flag::Unread,
                        mailbox_id,
                        thread_ids,
                    });
                }
            }
            Err(error) => {
                // Silent retry: the queue is retained and the next quiet
                // window flushes again.
                tracing::warn!(error = %error, "read mark flush failed, will retry");
                if error.is_auth() {
                    self.push_notice(Notice::AuthRequired);
                }
                self.readmarks.on_flush_failure(Instant::now());
            }
        }
    }

    fn apply_send_poll(&mut self, task_id: String, result: Result<SendTaskState>) {
        let Some(send) = self.pending_send.as_mut() else {
            return;
        };
        if send.task_id != task_id {
            return;
        }
        send.polling = false;
        match result {
            Ok(SendTaskState::Done) => {
                let mailbox_id = send.mailbox_id;
                let thread_id = send.thread_id;
                tracing::debug!(task_id = %task_id, "send task completed");
                self.pending_send = None;
                self.compose.reset();
                self.push_notice(Notice::SendSucceeded);
                self.apply_effect(&MutationEffect::MessageSent {
                    mailbox_id,
                    thread_id,
                });
            }
            Ok(SendTaskState::Failed) => {
                self.pending_send = None;
                self.push_notice(Notice::SendFailed(Error::Transport(
                    "send task failed".to_string(),
                )));
            }
            Err(error) if error.is_not_found() => {
                // The task itself is gone; nothing left to poll.
                self.pending_send = None;
                self.push_notice(Notice::SendFailed(error));
            }
            // Auth failures while polling do not force a logout; keep
            // polling until the task settles or the attempts run out.
            Ok(SendTaskState::Pending) | Err(_) => {
                send.attempts += 1;
                if send.attempts >= self.config.send_poll_max_attempts {
                    self.pending_send = None;
                    self.push_notice(Notice::SendFailed(Error::Transport(
                        "send task did not settle".to_string(),
                    )));
                } else {
                    send.next_poll = Instant::now() + self.config.send_poll();
                }
            }
        }
    }
}
