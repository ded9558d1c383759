//! Deferred events keyed by the kind of event that triggers them.

use crate::event::{Event, EventKind};
use tracing::debug;

struct Entry {
    trigger: EventKind,
    event: Event,
}

/// Events parked until some other event of a given kind occurs.
///
/// The trigger is an event kind, not an instance: when any event of that
/// kind reaches the loop without a registered handler, every matching entry
/// fires and is removed. Entries never expire on their own.
#[derive(Default)]
pub struct Agenda {
    entries: Vec<Entry>,
}

impl Agenda {
    /// Park `event` until an event of kind `trigger` occurs.
    pub fn schedule(&mut self, trigger: EventKind, event: Event) {
        debug!(%trigger, scheduled = %event.kind(), "event deferred");
        self.entries.push(Entry { trigger, event });
    }

    /// Remove and return every entry triggered by `kind`.
    pub fn take_due(&mut self, kind: EventKind) -> Vec<Event> {
        let mut due = Vec::new();
        let mut remaining = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if entry.trigger == kind {
                due.push(entry.event);
            } else {
                remaining.push(entry);
            }
        }
        self.entries = remaining;
        due
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tasks_event(tag: &str) -> Event {
        Event::Tasks {
            vnfbd: json!({ "tag": tag }),
        }
    }

    #[test]
    fn test_all_matching_entries_fire_once() {
        let mut agenda = Agenda::default();
        agenda.schedule(EventKind::Greetings, tasks_event("a"));
        agenda.schedule(EventKind::Greetings, tasks_event("b"));
        agenda.schedule(EventKind::Result, tasks_event("c"));

        let due = agenda.take_due(EventKind::Greetings);
        assert_eq!(due.len(), 2);
        assert_eq!(agenda.len(), 1);

        // A second occurrence finds nothing left.
        assert!(agenda.take_due(EventKind::Greetings).is_empty());
        assert_eq!(agenda.take_due(EventKind::Result).len(), 1);
        assert!(agenda.is_empty());
    }
}
