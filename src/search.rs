//! Search query parsing and the debounced filter normalizer.
//!
//! A query is free text plus structured tokens (`from:"x"`, `is:unread`,
//! `in:trash`, ...). Parsing and serialization round-trip losslessly for the
//! supported keys, and the canonical serialized form doubles as the cache key
//! signature for thread collections.
//!
//! Typed text flows through [`SearchNormalizer`]: the raw string is exposed
//! on every keystroke (the host mirrors it into the address bar), while the
//! cache-resetting commit of the parsed filter waits out a quiet window.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Named thread predicates the backend understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Folder {
    #[default]
    Inbox,
    Drafts,
    Sent,
    Trash,
    /// Everything except trash.
    All,
}

impl Folder {
    pub fn token(&self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Drafts => "drafts",
            Self::Sent => "sent",
            Self::Trash => "trash",
            Self::All => "all",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "inbox" => Some(Self::Inbox),
            "drafts" => Some(Self::Drafts),
            "sent" => Some(Self::Sent),
            "trash" => Some(Self::Trash),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

/// Canonical string form of a [`Filter`], used in thread cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterSignature(String);

impl FilterSignature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FilterSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The parsed form of a search query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Filter {
    pub folder: Folder,
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub is_unread: bool,
    pub is_trashed: bool,
    /// Free-text terms in input order.
    pub terms: Vec<String>,
}

impl Filter {
    /// Bare view of a folder, with no query on top.
    pub fn folder(folder: Folder) -> Self {
        Self {
            folder,
            ..Self::default()
        }
    }

    /// Whether this filter narrows beyond a bare folder view. Search-scoped
    /// cache entries are the ones reset when the committed query changes.
    pub fn is_search(&self) -> bool {
        self.from.is_some()
            || self.to.is_some()
            || self.subject.is_some()
            || self.is_unread
            || self.is_trashed
            || !self.terms.is_empty()
    }

    /// Parse a raw query string. Unknown `key:value` tokens and plain words
    /// become free-text terms; quoted values may contain spaces.
    pub fn parse(query: &str) -> Self {
        let mut filter = Self::default();
        for token in tokenize(query) {
            match token.split_once(':') {
                Some(("from", value)) if !value.is_empty() => {
                    filter.from = Some(unquote(value).to_string());
                }
                Some(("to", value)) if !value.is_empty() => {
                    filter.to = Some(unquote(value).to_string());
                }
                Some(("subject", value)) if !value.is_empty() => {
                    filter.subject = Some(unquote(value).to_string());
                }
                Some(("is", "unread")) => filter.is_unread = true,
                Some(("is", "trashed")) => filter.is_trashed = true,
                Some(("in", value)) => {
                    if let Some(folder) = Folder::from_token(unquote(value)) {
                        filter.folder = folder;
                    } else {
                        filter.terms.push(token);
                    }
                }
                _ => filter.terms.push(unquote(&token).to_string()),
            }
        }
        filter
    }

    /// Serialize back into query text. Structured tokens come first in a
    /// fixed order, then the free terms in their original order.
    pub fn serialize(&self) -> String {
        let mut parts = Vec::new();
        if self.folder != Folder::default() {
            parts.push(format!("in:{}", self.folder.token()));
        }
        if let Some(ref from) = self.from {
            parts.push(format!("from:\"{}\"", from));
        }
        if let Some(ref to) = self.to {
            parts.push(format!("to:\"{}\"", to));
        }
        if let Some(ref subject) = self.subject {
            parts.push(format!("subject:\"{}\"", subject));
        }
        if self.is_unread {
            parts.push("is:unread".to_string());
        }
        if self.is_trashed {
            parts.push("is:trashed".to_string());
        }
        for term in &self.terms {
            if term.contains(char::is_whitespace) {
                parts.push(format!("\"{}\"", term));
            } else {
                parts.push(term.clone());
            }
        }
        parts.join(" ")
    }

    /// Canonical signature for cache keying: serialized form with free terms
    /// sorted, so term order never splits a cache entry.
    pub fn signature(&self) -> FilterSignature {
        let mut canonical = self.clone();
        canonical.terms.sort();
        FilterSignature(canonical.serialize())
    }
}

/// Split on whitespace, keeping quoted runs (including `key:"a b"`) intact.
fn tokenize(query: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in query.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Debounces raw query text into committed [`Filter`] changes.
#[derive(Debug)]
pub struct SearchNormalizer {
    raw: String,
    committed: Filter,
    window: Duration,
    dirty_since: Option<Instant>,
}

impl SearchNormalizer {
    pub fn new(window: Duration) -> Self {
        Self {
            raw: String::new(),
            committed: Filter::default(),
            window,
            dirty_since: None,
        }
    }

    /// Record a keystroke's worth of query text. The raw value updates
    /// immediately; the commit deadline re-arms.
    pub fn input(&mut self, text: &str, now: Instant) {
        if text != self.raw {
            self.raw = text.to_string();
            self.dirty_since = Some(now);
        }
    }

    /// The text as typed, for address-bar mirroring.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The filter currently driving cache keys and fetches.
    pub fn committed(&self) -> &Filter {
        &self.committed
    }

    /// True once the quiet window has elapsed since the last keystroke.
    pub fn due(&self, now: Instant) -> bool {
        self.dirty_since
            .is_some_and(|since| now.duration_since(since) >= self.window)
    }

    /// Parse and commit the pending text. Returns the new filter only when
    /// it differs from the committed one, so rapid typing that lands back on
    /// the same filter causes no cache churn.
    pub fn commit(&mut self) -> Option<Filter> {
        self.dirty_since = None;
        let parsed = Filter::parse(&self.raw);
        if parsed == self.committed {
            None
        } else {
            self.committed = parsed.clone();
            Some(parsed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_free_text() {
        let filter = Filter::parse("quarterly report");
        assert_eq!(filter.terms, vec!["quarterly", "report"]);
        assert_eq!(filter.folder, Folder::Inbox);
        assert!(filter.is_search());
    }

    #[test]
    fn parse_structured_tokens() {
        let filter = Filter::parse("from:\"Jane Doe\" is:unread in:trash invoice");
        assert_eq!(filter.from.as_deref(), Some("Jane Doe"));
        assert!(filter.is_unread);
        assert_eq!(filter.folder, Folder::Trash);
        assert_eq!(filter.terms, vec!["invoice"]);
    }

    #[test]
    fn parse_unquoted_value() {
        let filter = Filter::parse("from:jane@example.com");
        assert_eq!(filter.from.as_deref(), Some("jane@example.com"));
    }

    #[test]
    fn unknown_key_becomes_term() {
        let filter = Filter::parse("size:large hello");
        assert_eq!(filter.terms, vec!["size:large", "hello"]);
    }

    #[test]
    fn quoted_phrase_is_one_term() {
        let filter = Filter::parse("\"project kickoff\" notes");
        assert_eq!(filter.terms, vec!["project kickoff", "notes"]);
    }

    #[test]
    fn round_trip_is_order_independent() {
        let a = Filter::parse("is:unread from:\"Ann\" report");
        let b = Filter::parse("report from:\"Ann\" is:unread");
        assert_eq!(a, b);
        assert_eq!(Filter::parse(&a.serialize()), a);
    }

    #[test]
    fn serialize_quotes_spaced_values() {
        let filter = Filter::parse("subject:\"status update\" in:sent");
        let text = filter.serialize();
        assert!(text.contains("subject:\"status update\""));
        assert!(text.contains("in:sent"));
        assert_eq!(Filter::parse(&text), filter);
    }

    #[test]
    fn signature_ignores_term_order() {
        let a = Filter::parse("alpha beta is:unread");
        let b = Filter::parse("beta is:unread alpha");
        assert_eq!(a.signature(), b.signature());
        assert_ne!(a.signature(), Filter::parse("alpha is:unread").signature());
    }

    #[test]
    fn bare_folder_is_not_search() {
        assert!(!Filter::parse("in:trash").is_search());
        assert!(!Filter::parse("").is_search());
        assert!(Filter::parse("in:trash is:unread").is_search());
    }

    #[test]
    fn default_folder_serializes_empty() {
        assert_eq!(Filter::default().serialize(), "");
    }

    #[test]
    fn normalizer_debounces_commit() {
        let window = Duration::from_millis(500);
        let mut normalizer = SearchNormalizer::new(window);
        let start = Instant::now();

        normalizer.input("inv", start);
        normalizer.input("invoice", start + Duration::from_millis(200));
        assert_eq!(normalizer.raw(), "invoice");
        // Quiet window counts from the last keystroke.
        assert!(!normalizer.due(start + Duration::from_millis(400)));
        assert!(normalizer.due(start + Duration::from_millis(700)));

        let committed = normalizer.commit().expect("filter changed");
        assert_eq!(committed.terms, vec!["invoice"]);
        assert!(!normalizer.due(start + Duration::from_secs(5)));
    }

    #[test]
    fn commit_without_change_returns_none() {
        let mut normalizer = SearchNormalizer::new(Duration::from_millis(500));
        let start = Instant::now();
        normalizer.input("report", start);
        assert!(normalizer.commit().is_some());
        // Retyping the same query commits nothing new.
        normalizer.input("report ", start);
        assert!(normalizer.commit().is_none());
    }
}
