//! Batched mark-as-read tracking.
//!
//! Visibility events funnel message ids into a set; one mutation per quiet
//! window flushes everything queued. The queue only empties on confirmed
//! success, so a failed flush silently retries with whatever has accumulated
//! since.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::model::MessageId;

#[derive(Debug)]
pub struct ReadMarkTracker {
    queue: HashSet<MessageId>,
    /// Ids included in the flush currently on the wire.
    in_flight: Option<Vec<MessageId>>,
    deadline: Option<Instant>,
    window: Duration,
}

impl ReadMarkTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            queue: HashSet::new(),
            in_flight: None,
            deadline: None,
            window,
        }
    }

    /// Record that a message became visible. Duplicate events collapse into
    /// the existing entry; every event re-arms the quiet window.
    pub fn mark_visible(&mut self, id: MessageId, now: Instant) {
        self.queue.insert(id);
        self.deadline = Some(now + self.window);
    }

    /// True once the quiet window has elapsed with something to flush and no
    /// flush already on the wire.
    pub fn due(&self, now: Instant) -> bool {
        self.in_flight.is_none()
            && !self.queue.is_empty()
            && self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Snapshot the queue for one mutation. The queue itself is kept until
    /// the flush confirms; ids are sorted so the request is deterministic.
    pub fn begin_flush(&mut self) -> Vec<MessageId> {
        let mut ids: Vec<MessageId> = self.queue.iter().copied().collect();
        ids.sort_unstable();
        self.in_flight = Some(ids.clone());
        self.deadline = None;
        ids
    }

    /// The flush confirmed: drop exactly the flushed ids. Anything that
    /// became visible in the meantime stays queued for the next window.
    pub fn on_flush_success(&mut self) {
        if let Some(flushed) = self.in_flight.take() {
            for id in flushed {
                self.queue.remove(&id);
            }
        }
    }

    /// The flush failed: retain the queue, merge with later events, and
    /// re-arm the window so the retry stays silent.
    pub fn on_flush_failure(&mut self, now: Instant) {
        self.in_flight = None;
        self.deadline = Some(now + self.window);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(300);

    #[test]
    fn duplicate_visibility_events_collapse() {
        let mut tracker = ReadMarkTracker::new(WINDOW);
        let now = Instant::now();
        tracker.mark_visible(1, now);
        tracker.mark_visible(1, now);
        tracker.mark_visible(2, now);
        assert_eq!(tracker.pending(), 2);
    }

    #[test]
    fn one_flush_per_quiet_window() {
        let mut tracker = ReadMarkTracker::new(WINDOW);
        let start = Instant::now();
        tracker.mark_visible(1, start);
        tracker.mark_visible(2, start + Duration::from_millis(100));

        // The window counts from the last event.
        assert!(!tracker.due(start + Duration::from_millis(300)));
        let due_at = start + Duration::from_millis(400);
        assert!(tracker.due(due_at));

        let ids = tracker.begin_flush();
        assert_eq!(ids, vec![1, 2]);
        // No second flush while the first is on the wire.
        assert!(!tracker.due(due_at + WINDOW));

        tracker.on_flush_success();
        assert!(tracker.is_empty());
        assert!(!tracker.due(due_at + WINDOW * 2));
    }

    #[test]
    fn failure_retains_queue_and_merges_later_events() {
        let mut tracker = ReadMarkTracker::new(WINDOW);
        let start = Instant::now();
        tracker.mark_visible(1, start);
        let flushed = tracker.begin_flush();
        assert_eq!(flushed, vec![1]);

        let failed_at = start + Duration::from_millis(500);
        tracker.on_flush_failure(failed_at);
        tracker.mark_visible(2, failed_at);

        assert!(tracker.due(failed_at + WINDOW));
        assert_eq!(tracker.begin_flush(), vec![1, 2]);
    }

    #[test]
    fn events_during_flight_survive_the_flush() {
        let mut tracker = ReadMarkTracker::new(WINDOW);
        let start = Instant::now();
        tracker.mark_visible(1, start);
        tracker.begin_flush();

        // Visible while the mutation is on the wire.
        tracker.mark_visible(2, start + Duration::from_millis(50));
        tracker.on_flush_success();

        assert_eq!(tracker.pending(), 1);
        assert!(tracker.due(start + Duration::from_millis(50) + WINDOW));
        assert_eq!(tracker.begin_flush(), vec![2]);
    }

    #[test]
    fn empty_queue_is_never_due() {
        let tracker = ReadMarkTracker::new(WINDOW);
        assert!(!tracker.due(Instant::now() + Duration::from_secs(10)));
    }
}
