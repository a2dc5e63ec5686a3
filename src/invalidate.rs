//! Maps mutation outcomes to the cache entries they make stale.
//!
//! Pure and table-driven: one mutation's targets are computed in one call
//! and applied together, then the engine triggers a single refetch round.
//! Mailbox unread/draft counters live on the mailbox list resource, so
//! counter-affecting mutations target the mailboxes key.

use crate::cache::CacheTarget;
use crate::model::{Flag, MailboxId, ThreadId};

/// The server-confirmed effect of a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationEffect {
    /// A read/unread or trashed/untrashed flip on one or more threads.
    FlagChanged {
        flag: Flag,
        mailbox_id: MailboxId,
        thread_ids: Vec<ThreadId>,
    },
    /// A draft left the building.
    MessageSent {
        mailbox_id: MailboxId,
        thread_id: Option<ThreadId>,
    },
    /// Draft created, updated, or deleted; moves the draft counter.
    DraftChanged { mailbox_id: MailboxId },
    /// Thread access granted or revoked; accesses are embedded in the
    /// thread's message detail.
    AccessChanged { thread_id: ThreadId },
}

/// Compute the stale set for one mutation.
pub fn targets(effect: &MutationEffect) -> Vec<CacheTarget> {
    match effect {
        MutationEffect::FlagChanged {
            flag: Flag::Unread,
            mailbox_id,
            thread_ids,
        } => {
            // Thread rows carry unread counts, message rows carry read
            // stamps, and the mailbox counter moved.
            let mut out = vec![CacheTarget::MailboxThreads(*mailbox_id)];
            out.extend(thread_ids.iter().map(|id| CacheTarget::Messages(*id)));
            out.push(CacheTarget::Mailboxes);
            out
        }
        MutationEffect::FlagChanged {
            flag: Flag::Trashed,
            mailbox_id,
            ..
        } => {
            // Visibility of the thread depends on the active filter, and the
            // aggregate counters moved.
            vec![
                CacheTarget::MailboxThreads(*mailbox_id),
                CacheTarget::Mailboxes,
            ]
        }
        MutationEffect::MessageSent {
            mailbox_id,
            thread_id,
        } => {
            let mut out = vec![CacheTarget::MailboxThreads(*mailbox_id)];
            if let Some(thread_id) = thread_id {
                out.push(CacheTarget::Messages(*thread_id));
            }
            out
        }
        MutationEffect::DraftChanged { .. } => vec![CacheTarget::Mailboxes],
        MutationEffect::AccessChanged { thread_id } => {
            vec![CacheTarget::Messages(*thread_id)]
        }
    }
}
