use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct FaultState {
    audit_classes: BTreeSet<String>,
    events: bool,
    history: bool,
    /// History inserts allowed before every later one fails.
    history_budget: Option<usize>,
}

/// Injected write failures, shared by every session of a database.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    state: Arc<Mutex<FaultState>>,
}

impl Faults {
    /// Fail audit record inserts for entities of `class_name`.
    pub fn fail_audit_writes_for(&self, class_name: &str) {
        self.state.lock().audit_classes.insert(class_name.to_string());
    }

    pub fn fail_event_writes(&self) {
        self.state.lock().events = true;
    }

    pub fn fail_history_writes(&self) {
        self.state.lock().history = true;
    }

    /// Let `count` more history inserts through, then fail the rest.
    pub fn fail_history_writes_after(&self, count: usize) {
        self.state.lock().history_budget = Some(count);
    }

    pub fn clear(&self) {
        *self.state.lock() = FaultState::default();
    }

    pub(crate) fn audit_fails(&self, class_name: &str) -> bool {
        self.state.lock().audit_classes.contains(class_name)
    }

    pub(crate) fn events_fail(&self) -> bool {
        self.state.lock().events
    }

    pub(crate) fn history_fails(&self) -> bool {
        let mut state = self.state.lock();
        if state.history {
            return true;
        }
        match &mut state.history_budget {
            Some(0) => true,
            Some(remaining) => {
                *remaining -= 1;
                false
            }
            None => false,
        }
    }
}
