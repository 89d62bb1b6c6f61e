use std::collections::HashSet;

use crate::world::{PushableId, WorldMap};

/// Pushables whose client-reported push the server could not range-verify.
/// They get the benefit of the doubt until a rollback happens for any
/// reason, at which point each is told its true state and the set clears.
#[derive(Debug, Default)]
pub struct QuestionableSet {
    pushables: HashSet<PushableId>,
}

impl QuestionableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, id: PushableId) {
        if self.pushables.insert(id) {
            log::warn!("added questionable pushable {id:?}");
        }
    }

    pub fn contains(&self, id: PushableId) -> bool {
        self.pushables.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.pushables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pushables.is_empty()
    }

    /// Notify every entry of its own authoritative state, then clear.
    pub fn drain_notifying(&mut self, map: &mut WorldMap) {
        for id in self.pushables.drain() {
            if let Some(pushable) = map.pushable_mut(id) {
                log::warn!("notified questionable pushable {id:?}");
                pushable.notify();
            }
        }
    }
}
