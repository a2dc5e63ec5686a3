//! Derives the selected mailbox and thread from navigation intent.
//!
//! Selection is never authoritative on its own: every resolution starts from
//! the ids the host was navigated to and cross-references them against the
//! cached collections. The resolver also reports the follow-up work a
//! resolution implies (redirect the host, keep paginating, refresh a stale
//! message list).

use chrono::{DateTime, Utc};

use crate::model::{Mailbox, MailboxId, Thread, ThreadId};

/// Thread part of the selection. `Pending` means the candidate was not in
/// the fetched pages but the collection end has not been reached, so it must
/// not be treated as deleted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadSelection {
    #[default]
    None,
    Selected(ThreadId),
    Pending(ThreadId),
}

impl ThreadSelection {
    pub fn selected_id(&self) -> Option<ThreadId> {
        match self {
            Self::Selected(id) => Some(*id),
            _ => None,
        }
    }

    pub fn candidate_id(&self) -> Option<ThreadId> {
        match self {
            Self::Selected(id) | Self::Pending(id) => Some(*id),
            Self::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionState {
    pub mailbox_id: Option<MailboxId>,
    pub thread: ThreadSelection,
}

/// Follow-up work implied by a resolution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionAction {
    /// The addressed ids differ from what resolved; the host should replace
    /// its navigation state with these.
    Redirect {
        mailbox_id: Option<MailboxId>,
        thread_id: Option<ThreadId>,
    },
    /// The selected thread's content changed since the last resolution; its
    /// message list must be refetched.
    RefreshMessages(ThreadId),
    /// The candidate thread may live on a page not fetched yet.
    LoadMoreThreads,
}

/// The thread collection as the resolver sees it: fetched rows plus whether
/// pagination has reached the end.
#[derive(Debug, Clone, Copy)]
pub struct ThreadsView<'a> {
    pub threads: &'a [Thread],
    pub end_reached: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub state: SelectionState,
    pub actions: Vec<SelectionAction>,
}

#[derive(Debug, Default)]
pub struct SelectionResolver {
    current: SelectionState,
    /// Activity stamp of the selected thread at the previous resolution.
    last_activity: Option<DateTime<Utc>>,
}

impl SelectionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> SelectionState {
        self.current
    }

    /// Resolve the addressed `(mailbox, thread)` against the cached
    /// collections. Re-run on every navigation change and every refresh of
    /// the underlying collections; unchanged inputs resolve identically.
    pub fn resolve(
        &mut self,
        candidate_mailbox: Option<MailboxId>,
        candidate_thread: Option<ThreadId>,
        mailboxes: &[Mailbox],
        threads: Option<ThreadsView<'_>>,
    ) -> Resolution {
        let mut actions = Vec::new();

        let mailbox_id = candidate_mailbox
            .filter(|id| mailboxes.iter().any(|m| m.id == *id))
            .or_else(|| mailboxes.first().map(|m| m.id));
        let mailbox_changed = mailbox_id != self.current.mailbox_id;

        // A candidate carried over from the previous mailbox is not a deep
        // link; it resets with the mailbox identity.
        let requested_thread = candidate_thread;
        let candidate_thread = if mailbox_changed
            && candidate_thread.is_some()
            && candidate_thread == self.current.thread.candidate_id()
        {
            None
        } else {
            candidate_thread
        };

        let thread = match (candidate_thread, mailbox_id) {
            (None, _) | (_, None) => ThreadSelection::None,
            (Some(id), Some(_)) => match threads {
                None => ThreadSelection::Pending(id),
                Some(view) => {
                    if view.threads.iter().any(|t| t.id == id) {
                        ThreadSelection::Selected(id)
                    } else if !view.end_reached {
                        actions.push(SelectionAction::LoadMoreThreads);
                        ThreadSelection::Pending(id)
                    } else {
                        // Fetched and absent: dropped out of the filter.
                        ThreadSelection::None
                    }
                }
            },
        };

        let needs_redirect = mailbox_id != candidate_mailbox
            || (requested_thread.is_some() && thread == ThreadSelection::None);
        if needs_redirect && (mailbox_id.is_some() || candidate_mailbox.is_some()) {
            actions.push(SelectionAction::Redirect {
                mailbox_id,
                thread_id: thread.selected_id(),
            });
        }

        // Re-validate the message list of a surviving selection against the
        // thread's activity stamp.
        match thread {
            ThreadSelection::Selected(id) => {
                let activity = threads
                    .and_then(|view| view.threads.iter().find(|t| t.id == id))
                    .map(|t| t.activity_at);
                if self.current.thread == ThreadSelection::Selected(id)
                    && let (Some(prev), Some(next)) = (self.last_activity, activity)
                    && prev != next
                {
                    actions.push(SelectionAction::RefreshMessages(id));
                }
                self.last_activity = activity;
            }
            _ => self.last_activity = None,
        }

        self.current = SelectionState { mailbox_id, thread };
        Resolution {
            state: self.current,
            actions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn mailbox(id: i64, unread: u32) -> Mailbox {
        Mailbox {
            id,
            address: format!("user{}@example.com", id),
            count_unread: unread,
            count_drafts: 0,
        }
    }

    fn thread_at(id: i64, stamp: i64) -> Thread {
        Thread {
            id,
            subject: "s".to_string(),
            count_messages: 2,
            count_unread: 1,
            count_trashed: 0,
            activity_at: Utc.timestamp_opt(stamp, 0).unwrap(),
            sender_names: Vec::new(),
            labels: Vec::new(),
        }
    }

    fn view(threads: &[Thread], end_reached: bool) -> ThreadsView<'_> {
        ThreadsView {
            threads,
            end_reached,
        }
    }

    #[test]
    fn defaults_to_first_mailbox() {
        let mut resolver = SelectionResolver::new();
        let boxes = vec![mailbox(1, 5), mailbox(2, 0)];
        let res = resolver.resolve(None, None, &boxes, None);
        assert_eq!(res.state.mailbox_id, Some(1));
        assert_eq!(res.state.thread, ThreadSelection::None);
        // URL canonicalization: the host should now address mailbox 1.
        assert!(res.actions.contains(&SelectionAction::Redirect {
            mailbox_id: Some(1),
            thread_id: None
        }));
    }

    #[test]
    fn unknown_mailbox_falls_back_to_first() {
        let mut resolver = SelectionResolver::new();
        let boxes = vec![mailbox(1, 0), mailbox(2, 0)];
        let res = resolver.resolve(Some(99), None, &boxes, None);
        assert_eq!(res.state.mailbox_id, Some(1));
        assert!(matches!(
            res.actions[..],
            [SelectionAction::Redirect {
                mailbox_id: Some(1),
                ..
            }]
        ));
    }

    #[test]
    fn empty_mailbox_collection_is_terminal() {
        let mut resolver = SelectionResolver::new();
        let res = resolver.resolve(Some(1), Some(10), &[], None);
        assert_eq!(res.state.mailbox_id, None);
        assert_eq!(res.state.thread, ThreadSelection::None);
    }

    #[test]
    fn thread_selected_when_present() {
        let mut resolver = SelectionResolver::new();
        let boxes = vec![mailbox(1, 0)];
        let threads = vec![thread_at(10, 100), thread_at(11, 200)];
        let res = resolver.resolve(Some(1), Some(11), &boxes, Some(view(&threads, true)));
        assert_eq!(res.state.thread, ThreadSelection::Selected(11));
        assert!(res.actions.is_empty());
    }

    #[test]
    fn absent_thread_with_more_pages_stays_pending() {
        let mut resolver = SelectionResolver::new();
        let boxes = vec![mailbox(1, 0)];
        let threads = vec![thread_at(10, 100)];
        let res = resolver.resolve(Some(1), Some(50), &boxes, Some(view(&threads, false)));
        assert_eq!(res.state.thread, ThreadSelection::Pending(50));
        assert_eq!(res.actions, vec![SelectionAction::LoadMoreThreads]);
    }

    #[test]
    fn absent_thread_at_collection_end_clears_selection() {
        let mut resolver = SelectionResolver::new();
        let boxes = vec![mailbox(1, 0)];
        let threads = vec![thread_at(10, 100)];
        let res = resolver.resolve(Some(1), Some(50), &boxes, Some(view(&threads, true)));
        assert_eq!(res.state.thread, ThreadSelection::None);
        assert!(res.actions.contains(&SelectionAction::Redirect {
            mailbox_id: Some(1),
            thread_id: None
        }));
    }

    #[test]
    fn trashed_thread_drops_out_on_refresh() {
        let mut resolver = SelectionResolver::new();
        let boxes = vec![mailbox(1, 0)];
        let before = vec![thread_at(10, 100), thread_at(11, 200)];
        let res = resolver.resolve(Some(1), Some(10), &boxes, Some(view(&before, true)));
        assert_eq!(res.state.thread, ThreadSelection::Selected(10));

        // Thread 10 was trashed and the active filter excludes trash.
        let after = vec![thread_at(11, 200)];
        let res = resolver.resolve(Some(1), Some(10), &boxes, Some(view(&after, true)));
        assert_eq!(res.state.thread, ThreadSelection::None);
    }

    #[test]
    fn mailbox_change_resets_carried_thread() {
        let mut resolver = SelectionResolver::new();
        let boxes = vec![mailbox(1, 0), mailbox(2, 0)];
        let threads = vec![thread_at(10, 100)];
        resolver.resolve(Some(1), Some(10), &boxes, Some(view(&threads, true)));

        // Same thread id addressed under a different mailbox: stale carry-over.
        let res = resolver.resolve(Some(2), Some(10), &boxes, None);
        assert_eq!(res.state.mailbox_id, Some(2));
        assert_eq!(res.state.thread, ThreadSelection::None);
        // The stale thread id should be dropped from the address too.
        assert!(res.actions.contains(&SelectionAction::Redirect {
            mailbox_id: Some(2),
            thread_id: None
        }));
    }

    #[test]
    fn deep_link_thread_survives_mailbox_change() {
        let mut resolver = SelectionResolver::new();
        let boxes = vec![mailbox(1, 0), mailbox(2, 0)];
        let threads = vec![thread_at(10, 100)];
        resolver.resolve(Some(1), Some(10), &boxes, Some(view(&threads, true)));

        let res = resolver.resolve(Some(2), Some(77), &boxes, None);
        assert_eq!(res.state.thread, ThreadSelection::Pending(77));
    }

    #[test]
    fn refresh_with_same_inputs_is_idempotent() {
        let mut resolver = SelectionResolver::new();
        let boxes = vec![mailbox(1, 0)];
        let threads = vec![thread_at(10, 100)];
        let first = resolver.resolve(Some(1), Some(10), &boxes, Some(view(&threads, true)));
        let second = resolver.resolve(Some(1), Some(10), &boxes, Some(view(&threads, true)));
        assert_eq!(first.state, second.state);
        assert!(second.actions.is_empty());
    }

    #[test]
    fn activity_change_triggers_message_refresh_once() {
        let mut resolver = SelectionResolver::new();
        let boxes = vec![mailbox(1, 0)];
        let before = vec![thread_at(10, 100)];
        resolver.resolve(Some(1), Some(10), &boxes, Some(view(&before, true)));

        let after = vec![thread_at(10, 300)];
        let res = resolver.resolve(Some(1), Some(10), &boxes, Some(view(&after, true)));
        assert_eq!(res.actions, vec![SelectionAction::RefreshMessages(10)]);

        // Stamp unchanged on the next pass: nothing further to refresh.
        let res = resolver.resolve(Some(1), Some(10), &boxes, Some(view(&after, true)));
        assert!(res.actions.is_empty());
    }
}
