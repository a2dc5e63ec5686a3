//! Engine-wide tuning constants.
//!
//! Centralizes magic numbers to make them discoverable; user-facing
//! overrides live in [`crate::config::EngineConfig`].

/// Quiet window for batching mark-as-read mutations, in milliseconds.
/// Messages scrolled past quickly are collapsed into one request.
pub const READ_MARK_DEBOUNCE_MS: u64 = 300;

/// Quiet window before typed query text commits as the active filter,
/// in milliseconds. The raw text is exposed immediately; only the
/// cache-resetting commit waits.
pub const SEARCH_DEBOUNCE_MS: u64 = 500;

/// Interval between background refreshes of the mailbox list, in seconds.
pub const MAILBOX_POLL_SECS: u64 = 60;

/// Interval between polls of an in-flight send task, in milliseconds.
pub const SEND_POLL_MS: u64 = 1_000;

/// Maximum send task polls before the send is reported as failed.
pub const SEND_POLL_MAX_ATTEMPTS: u32 = 30;
