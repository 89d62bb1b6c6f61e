use glam::IVec2;

use crate::world::PushableId;

/// Pacing between steps of a deferred interaction chain, letting other
/// state settle between pushes.
pub const INTERACT_STEP_SECS: f32 = 0.1;

/// Delay before a space-exposure damage tick lands.
pub const EXPOSURE_TICK_SECS: f32 = 1.0;

/// A deferred continuation. Tasks re-check their preconditions when they
/// fire and abandon themselves if those no longer hold; there is no
/// explicit cancellation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Task {
    /// Resolve a blocked move: open a door or push the first solid
    /// occupant at the bumped tile.
    BumpInteract {
        entity_id: u32,
        origin: IVec2,
        direction: IVec2,
    },
    /// One step of the alternating space push exchange.
    SpacePushStep {
        entity_id: u32,
        pushable: PushableId,
        direction: IVec2,
        remaining: u32,
        /// Whose turn: true pushes the object counter-direction, false
        /// pushes the acting entity along the impulse.
        push_object: bool,
    },
    /// Damage-over-time tick for an entity exposed to vacuum.
    SpaceExposure { entity_id: u32 },
}

#[derive(Debug, Clone, Copy)]
struct ScheduledTask {
    due: f64,
    task: Task,
}

/// Single owner of all deferred work, driven from the tick loop. Replaces
/// ad hoc timers: every delayed continuation goes through here.
#[derive(Debug, Default)]
pub struct TaskScheduler {
    now: f64,
    tasks: Vec<ScheduledTask>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, delay_secs: f32, task: Task) {
        self.tasks.push(ScheduledTask {
            due: self.now + delay_secs as f64,
            task,
        });
    }

    /// Advance simulated time and collect everything now due, in due order.
    pub fn advance(&mut self, dt: f32) -> Vec<Task> {
        self.now += dt as f64;
        let now = self.now;

        let mut due: Vec<ScheduledTask> = Vec::new();
        self.tasks.retain(|t| {
            if t.due <= now {
                due.push(*t);
                false
            } else {
                true
            }
        });
        due.sort_by(|a, b| a.due.total_cmp(&b.due));
        due.into_iter().map(|t| t.task).collect()
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    pub fn has_exposure_task(&self, entity_id: u32) -> bool {
        self.tasks
            .iter()
            .any(|t| matches!(t.task, Task::SpaceExposure { entity_id: id } if id == entity_id))
    }
}
