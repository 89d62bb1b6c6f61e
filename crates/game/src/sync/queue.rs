use std::collections::VecDeque;

use super::state::PendingAction;

/// Result of admitting one action. `Overflowed` means the action went in but
/// the bound was crossed; the owner must roll the entity back before the
/// queue is processed further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Rejected,
    Overflowed,
}

/// Bounded FIFO of pending client move intents. The bound is the
/// backpressure mechanism: overflow is a hard signal, never a silent drop.
#[derive(Debug)]
pub struct ActionQueue {
    actions: VecDeque<PendingAction>,
    last_admitted: Option<PendingAction>,
    max_size: usize,
}

impl ActionQueue {
    pub const MAX_QUEUE: usize = 10;

    pub fn new() -> Self {
        Self::with_capacity(Self::MAX_QUEUE)
    }

    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            actions: VecDeque::with_capacity(max_size + 1),
            last_admitted: None,
            max_size,
        }
    }

    pub fn submit(&mut self, action: PendingAction) -> Admission {
        if !self.actions.is_empty()
            && self
                .last_admitted
                .is_some_and(|last| last.is_non_predictive)
            && action.is_non_predictive
        {
            log::info!("ignored {action:?}: two non-predictive actions in a row");
            return Admission::Rejected;
        }

        self.actions.push_back(action);
        self.last_admitted = Some(action);

        if self.actions.len() > self.max_size {
            log::warn!(
                "pending actions overflow (more than {}): server lag or speed-hack",
                self.max_size
            );
            return Admission::Overflowed;
        }
        Admission::Accepted
    }

    pub fn dequeue(&mut self) -> Option<PendingAction> {
        self.actions.pop_front()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Default for ActionQueue {
    fn default() -> Self {
        Self::new()
    }
}
