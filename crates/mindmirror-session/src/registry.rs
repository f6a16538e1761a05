use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;
use uuid::Uuid;

use crate::reconciler::SessionState;

/// Who is allowed to write the session state right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    /// A passive reconcile (session check, provider refresh) owns the slot.
    Reconciling,
    /// An explicit auth action (register, login, logout, federated callback)
    /// owns the slot.
    Action,
}

#[derive(Default)]
struct Slot {
    state: SessionState,
    phase: Phase,
    generation: u64,
}

/// Per-identity session state with a single designated writer per phase.
///
/// An explicit action owns the whole sequence it starts; passive reconciles
/// defer while any writer is active, and a writer that was superseded has its
/// result discarded instead of clobbering the newer phase's state.
pub struct SessionRegistry {
    slots: Mutex<HashMap<Uuid, Slot>>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            slots: Mutex::new(HashMap::new()),
        })
    }

    /// Current state as observed by anyone who is not the writer.
    pub fn snapshot(&self, id: Uuid) -> SessionState {
        let slots = self.slots.lock().expect("session slot lock poisoned");
        slots.get(&id).map(|s| s.state.clone()).unwrap_or_default()
    }

    /// Claims the slot for an explicit auth action. Fails if another action
    /// already owns it; supersedes any passive reconcile in flight.
    pub fn begin_action(self: &Arc<Self>, id: Uuid) -> Option<PhaseGuard> {
        self.begin(id, Phase::Action)
    }

    /// Claims the slot for a passive reconcile. Fails if any writer is
    /// active, in which case the caller should report the snapshot as-is.
    pub fn begin_reconcile(self: &Arc<Self>, id: Uuid) -> Option<PhaseGuard> {
        self.begin(id, Phase::Reconciling)
    }

    fn begin(self: &Arc<Self>, id: Uuid, phase: Phase) -> Option<PhaseGuard> {
        let mut slots = self.slots.lock().expect("session slot lock poisoned");
        let slot = slots.entry(id).or_default();
        match (slot.phase, phase) {
            (Phase::Idle, _) => {}
            // An action supersedes a passive reconcile; the reconcile's
            // guard goes stale and its eventual write is discarded.
            (Phase::Reconciling, Phase::Action) => {}
            _ => return None,
        }
        slot.phase = phase;
        slot.generation += 1;
        slot.state = SessionState::Resolving;
        Some(PhaseGuard {
            registry: Arc::clone(self),
            id,
            generation: slot.generation,
            done: false,
        })
    }

    fn finish(&self, id: Uuid, generation: u64, state: Option<SessionState>) -> bool {
        let mut slots = self.slots.lock().expect("session slot lock poisoned");
        let Some(slot) = slots.get_mut(&id) else {
            return false;
        };
        if slot.generation != generation {
            return false;
        }
        slot.phase = Phase::Idle;
        if let Some(state) = state {
            slot.state = state;
        }
        // Signed-out slots carry no information; drop them.
        if slot.state == SessionState::Unresolved {
            slots.remove(&id);
        }
        true
    }
}

/// RAII claim on a session slot. Publish the resolved state with
/// [`PhaseGuard::finish`]; dropping the guard without finishing releases the
/// slot and leaves the observable state at `Resolving` for the next writer to
/// settle.
pub struct PhaseGuard {
    registry: Arc<SessionRegistry>,
    id: Uuid,
    generation: u64,
    done: bool,
}

impl PhaseGuard {
    /// Publishes the state this writer resolved. Returns false when the
    /// guard was superseded and the write was discarded.
    pub fn finish(mut self, state: SessionState) -> bool {
        self.done = true;
        let applied = self.registry.finish(self.id, self.generation, Some(state));
        if !applied {
            warn!("Discarding superseded session write for identity {}", self.id);
        }
        applied
    }
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        if !self.done {
            self.registry.finish(self.id, self.generation, None);
        }
    }
}
