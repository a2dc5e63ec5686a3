//! Mailbox synchronization engine for a webmail client.
//!
//! Keeps three nested, paginated resource collections (mailboxes, threads,
//! messages) consistent with a URL-addressed selection while background
//! mutations race user navigation: batched read-marking, draft lifecycle
//! with sender transfers, debounced search, and cache invalidation with
//! refetch. The UI, the HTTP transport, and session bootstrap are external
//! collaborators; the transport plugs in through
//! [`transport::MailTransport`] and the UI consumes [`engine::Engine`]
//! snapshots.

pub mod cache;
pub mod config;
pub mod constants;
pub mod draft;
pub mod engine;
pub mod error;
pub mod invalidate;
pub mod model;
pub mod paginate;
pub mod readmark;
pub mod search;
pub mod selection;
pub mod transport;
pub mod viewport;

pub use config::EngineConfig;
pub use engine::{Engine, Notice};
pub use error::{Error, Result};
pub use search::Filter;
pub use selection::SelectionState;
pub use transport::MailTransport;
