//! Transport collaborator interface.
//!
//! The engine drives HTTP and serialization through this trait but never
//! implements them; the host wires in a real client, tests wire in a
//! scripted double. Implementations map backend failures into the engine's
//! error taxonomy (a 401 becomes [`Error::Auth`](crate::error::Error::Auth)
//! no matter which operation tripped it).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::draft::DraftForm;
use crate::error::Result;
use crate::model::{
    Flag, Mailbox, MailboxId, Message, MessageId, MessageList, Page, Thread, ThreadId,
};
use crate::search::Filter;

/// Receipt for an asynchronous send; the caller polls the task until it
/// settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub task_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendTaskState {
    Pending,
    Done,
    Failed,
}

#[async_trait]
pub trait MailTransport: Send + Sync + 'static {
    async fn list_mailboxes(&self) -> Result<Vec<Mailbox>>;

    /// One numbered page of the mailbox's thread collection under `filter`.
    async fn list_threads(
        &self,
        mailbox_id: MailboxId,
        filter: &Filter,
        page: u32,
    ) -> Result<Page<Thread>>;

    async fn list_messages(&self, thread_id: ThreadId) -> Result<MessageList>;

    /// Set or clear a flag across threads and/or individual messages.
    async fn set_flag(
        &self,
        flag: Flag,
        value: bool,
        thread_ids: &[ThreadId],
        message_ids: &[MessageId],
    ) -> Result<()>;

    async fn create_draft(&self, payload: &DraftForm) -> Result<Message>;

    async fn update_draft(&self, id: MessageId, payload: &DraftForm) -> Result<Message>;

    async fn delete_draft(&self, id: MessageId) -> Result<()>;

    async fn send_message(
        &self,
        draft_id: MessageId,
        html_body: &str,
        text_body: &str,
    ) -> Result<SendReceipt>;

    /// Poll an in-flight send. Auth failures here do not force a logout;
    /// the engine treats them as transient while the task settles.
    async fn send_status(&self, task_id: &str) -> Result<SendTaskState>;
}
