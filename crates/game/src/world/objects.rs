use std::collections::VecDeque;

use glam::IVec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PushableId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DoorId(pub u32);

/// A movable object: crates, closets, anything the bump interaction can
/// shove. Carries its own impulse so it can drift in space like an entity.
#[derive(Debug)]
pub struct Pushable {
    pub id: PushableId,
    pub position: IVec2,
    pub impulse: IVec2,
    pub is_solid: bool,
    queued_pushes: VecDeque<IVec2>,
    pending_notify: bool,
}

impl Pushable {
    pub fn new(id: PushableId, position: IVec2, is_solid: bool) -> Self {
        Self {
            id,
            position,
            impulse: IVec2::ZERO,
            is_solid,
            queued_pushes: VecDeque::new(),
            pending_notify: false,
        }
    }

    pub fn is_floating(&self) -> bool {
        self.impulse != IVec2::ZERO
    }

    /// Defer a push to be resolved on a later simulation step.
    pub fn queue_push(&mut self, direction: IVec2) {
        if direction == IVec2::ZERO {
            return;
        }
        self.queued_pushes.push_back(direction);
    }

    pub fn take_queued_push(&mut self) -> Option<IVec2> {
        self.queued_pushes.pop_front()
    }

    pub fn queued_push_count(&self) -> usize {
        self.queued_pushes.len()
    }

    /// Mark this object for a state broadcast on the next server flush.
    /// Used when a client's prediction about it may be stale.
    pub fn notify(&mut self) {
        self.pending_notify = true;
    }

    pub fn take_pending_notify(&mut self) -> bool {
        std::mem::take(&mut self.pending_notify)
    }

    /// Halt drifting in place.
    pub fn stop(&mut self) {
        self.impulse = IVec2::ZERO;
        self.queued_pushes.clear();
        self.pending_notify = true;
    }

    /// Snap to an exact tile, e.g. when a drifting entity grabs it.
    pub fn set_position(&mut self, position: IVec2) {
        self.position = position;
        self.pending_notify = true;
    }
}

#[derive(Debug)]
pub struct Door {
    pub id: DoorId,
    pub position: IVec2,
    pub open: bool,
}

impl Door {
    pub fn new(id: DoorId, position: IVec2) -> Self {
        Self {
            id,
            position,
            open: false,
        }
    }

    pub fn interact(&mut self, entity_id: u32) {
        if !self.open {
            log::info!("entity {} opened door {:?}", entity_id, self.id);
            self.open = true;
        }
    }

    pub fn is_passable(&self) -> bool {
        self.open
    }
}
