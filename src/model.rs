//! Core data model shared by the cache, resolver, and transport layers.
//!
//! These are the engine's copies of what the backend serves. The cache owns
//! the stored collections; everything else works on `Arc` snapshots and ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type MailboxId = i64;
pub type ThreadId = i64;
pub type MessageId = i64;

/// A sender identity with its unread/draft counters.
///
/// Counters change only as a side effect of server-confirmed flag, send,
/// and delete operations; the engine refetches them rather than adjusting
/// them locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    pub id: MailboxId,
    pub address: String,
    pub count_unread: u32,
    pub count_drafts: u32,
}

/// A conversation summary row as served by the thread list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub subject: String,
    pub count_messages: u32,
    pub count_unread: u32,
    pub count_trashed: u32,
    /// Timestamp of the newest activity; changes whenever thread content does.
    pub activity_at: DateTime<Utc>,
    /// Display names of the participating senders.
    pub sender_names: Vec<String>,
    pub labels: Vec<String>,
}

impl Thread {
    pub fn has_unread(&self) -> bool {
        self.count_unread > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub name: String,
    pub address: String,
}

impl Contact {
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
        }
    }

    /// Display name, falling back to the bare address.
    pub fn display(&self) -> &str {
        if self.name.is_empty() {
            &self.address
        } else {
            &self.name
        }
    }
}

/// Reference to an uploaded attachment; the upload subsystem itself lives
/// outside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub id: i64,
    pub file_name: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub thread_id: ThreadId,
    pub from: Contact,
    pub to: Vec<Contact>,
    #[serde(default)]
    pub cc: Vec<Contact>,
    #[serde(default)]
    pub bcc: Vec<Contact>,
    pub subject: String,
    pub text: String,
    #[serde(default)]
    pub html: Option<String>,
    /// `None` means unread.
    pub read_at: Option<DateTime<Utc>>,
    pub is_draft: bool,
    pub is_trashed: bool,
    /// The message this one replies to; used to attach an in-progress reply
    /// draft to its parent for display.
    #[serde(default)]
    pub parent_id: Option<MessageId>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
}

impl Message {
    pub fn is_unread(&self) -> bool {
        self.read_at.is_none() && !self.is_draft
    }
}

/// One numbered page of a server collection. `next`/`previous` carry
/// adjacent page numbers, absent at the collection boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub count: u32,
    pub next: Option<u32>,
    pub previous: Option<u32>,
}

/// The unpaginated message collection of one thread, in the backend's
/// envelope shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageList {
    pub results: Vec<Message>,
    pub count: u32,
}

/// Mutable flags the backend exposes through the flag endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flag {
    Unread,
    Trashed,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unread => "unread",
            Self::Trashed => "trashed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_display_falls_back_to_address() {
        let named = Contact::new("Jane Doe", "jane@example.com");
        assert_eq!(named.display(), "Jane Doe");
        let bare = Contact::new("", "jane@example.com");
        assert_eq!(bare.display(), "jane@example.com");
    }

    #[test]
    fn message_unread_requires_no_read_stamp_and_not_draft() {
        let mut msg = Message {
            id: 1,
            thread_id: 10,
            from: Contact::new("A", "a@example.com"),
            to: vec![Contact::new("B", "b@example.com")],
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: "hello".to_string(),
            text: "body".to_string(),
            html: None,
            read_at: None,
            is_draft: false,
            is_trashed: false,
            parent_id: None,
            attachments: Vec::new(),
        };
        assert!(msg.is_unread());
        msg.read_at = Some(Utc::now());
        assert!(!msg.is_unread());
        msg.read_at = None;
        msg.is_draft = true;
        assert!(!msg.is_unread());
    }

    #[test]
    fn page_round_trips_through_json() {
        let page = Page {
            results: vec![1u32, 2, 3],
            count: 40,
            next: Some(2),
            previous: None,
        };
        let json = serde_json::to_string(&page).unwrap();
        let back: Page<u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, page);
    }
}
