//! Draft compose session state machine.
//!
//! One session per compose window. Saves are diffed against the last saved
//! snapshot, so clean saves are no-ops and a subject edit issues an update
//! while a sender change runs the delete-then-recreate transfer (drafts are
//! server-side scoped to their sender mailbox). The session never reports a
//! draft id that no longer exists on the server.

use crate::error::{Error, Result};
use crate::model::{Contact, MailboxId, Message, MessageId};

/// Snapshot of the compose form as the host sees it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DraftForm {
    /// Sender mailbox the draft is (or will be) bound to.
    pub mailbox_id: MailboxId,
    pub to: Vec<Contact>,
    pub cc: Vec<Contact>,
    pub bcc: Vec<Contact>,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
    /// Message being replied to, if any.
    pub parent_id: Option<MessageId>,
}

impl DraftForm {
    /// True when there is nothing worth persisting yet.
    pub fn is_blank(&self) -> bool {
        self.to.is_empty()
            && self.cc.is_empty()
            && self.bcc.is_empty()
            && self.subject.is_empty()
            && self.text.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DraftState {
    #[default]
    New,
    Creating,
    Saved,
    Updating,
    Transferring,
}

/// What the caller must execute to persist the current form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveAction {
    /// Nothing dirty, or a save is already running.
    Nothing,
    Create,
    Update(MessageId),
    /// Sender changed: delete the old draft, then create under the new
    /// mailbox. Two server calls, one logical save.
    Transfer { delete: MessageId },
}

#[derive(Debug, Default)]
pub struct DraftSession {
    state: DraftState,
    draft: Option<Message>,
    bound_mailbox: Option<MailboxId>,
    saved_form: Option<DraftForm>,
}

impl DraftSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DraftState {
        self.state
    }

    /// Identity of the saved draft, if one exists server-side.
    pub fn draft_id(&self) -> Option<MessageId> {
        self.draft.as_ref().map(|d| d.id)
    }

    pub fn draft(&self) -> Option<&Message> {
        self.draft.as_ref()
    }

    /// Whether the form has changed since the last successful save.
    pub fn is_dirty(&self, form: &DraftForm) -> bool {
        match self.saved_form {
            Some(ref saved) => saved != form,
            None => !form.is_blank(),
        }
    }

    /// Decide what a save of `form` requires. Transitions into the busy
    /// state for the returned action; the caller reports the outcome through
    /// the `on_*` methods.
    pub fn begin_save(&mut self, form: &DraftForm) -> SaveAction {
        if matches!(
            self.state,
            DraftState::Creating | DraftState::Updating | DraftState::Transferring
        ) {
            return SaveAction::Nothing;
        }
        if !self.is_dirty(form) {
            return SaveAction::Nothing;
        }
        match self.draft {
            None => {
                self.state = DraftState::Creating;
                SaveAction::Create
            }
            Some(ref draft) if self.bound_mailbox != Some(form.mailbox_id) => {
                self.state = DraftState::Transferring;
                SaveAction::Transfer { delete: draft.id }
            }
            Some(ref draft) => {
                self.state = DraftState::Updating;
                SaveAction::Update(draft.id)
            }
        }
    }

    /// A create (initial or transfer tail) succeeded.
    pub fn on_created(&mut self, draft: Message, form: &DraftForm) {
        self.state = DraftState::Saved;
        self.bound_mailbox = Some(form.mailbox_id);
        self.saved_form = Some(form.clone());
        self.draft = Some(draft);
    }

    /// An update succeeded.
    pub fn on_updated(&mut self, draft: Message, form: &DraftForm) {
        self.state = DraftState::Saved;
        self.saved_form = Some(form.clone());
        self.draft = Some(draft);
    }

    /// The create/update call failed, or the transfer's delete failed. The
    /// previous snapshot (and draft id, if any) stays so the next save
    /// retries the same step.
    pub fn on_save_failed(&mut self) {
        self.state = match self.state {
            DraftState::Creating => DraftState::New,
            DraftState::Updating | DraftState::Transferring => DraftState::Saved,
            other => other,
        };
    }

    /// The transfer's delete succeeded; the old id must never be referenced
    /// again even if the following create fails.
    pub fn on_transfer_deleted(&mut self) {
        self.draft = None;
        self.bound_mailbox = None;
    }

    /// The transfer's create failed after the delete succeeded. The session
    /// drops to unsaved-new: no draft id, no snapshot, the caller keeps the
    /// form content and the next save issues a plain create.
    pub fn on_transfer_create_failed(&mut self) {
        self.state = DraftState::New;
        self.draft = None;
        self.bound_mailbox = None;
        self.saved_form = None;
    }

    /// Drop all session state after the draft was consumed by a send.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Reject obviously malformed sends before any network call.
pub fn validate_for_send(form: &DraftForm) -> Result<()> {
    let recipients: Vec<&Contact> = form
        .to
        .iter()
        .chain(form.cc.iter())
        .chain(form.bcc.iter())
        .collect();
    if form.to.is_empty() {
        return Err(Error::Validation("at least one recipient required".into()));
    }
    for contact in recipients {
        let address = contact.address.trim();
        if address.is_empty() || !address.contains('@') || address.contains(char::is_whitespace) {
            return Err(Error::Validation(format!(
                "malformed recipient address: {:?}",
                contact.address
            )));
        }
    }
    if form.subject.contains('\n') || form.subject.contains('\r') {
        return Err(Error::Validation("subject must be a single line".into()));
    }
    Ok(())
}
