use bitflags::bitflags;
use glam::{IVec2, Vec2};

use crate::net::{ActionMessage, MoveUpdate};
use crate::world::MatrixId;

bitflags! {
    /// One-shot replication hints. IMPORTANT and RESET_QUEUE are cleared
    /// when an all-observer broadcast actually goes out; NO_LERP is set per
    /// message by the sender.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StateFlags: u8 {
        const IMPORTANT = 1 << 0;
        const RESET_QUEUE = 1 << 1;
        const NO_LERP = 1 << 2;
    }
}

/// The server's single source of truth for one entity's tile position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveState {
    /// Confirmed-move counter clients reconcile their prediction against.
    pub move_number: u32,
    pub matrix_id: MatrixId,
    pub position: IVec2,
    /// Nonzero while drifting; the per-tick direction of travel.
    pub impulse: IVec2,
    pub flags: StateFlags,
}

impl MoveState {
    pub fn at(position: IVec2, matrix_id: MatrixId) -> Self {
        Self {
            move_number: 0,
            matrix_id,
            position,
            impulse: IVec2::ZERO,
            flags: StateFlags::empty(),
        }
    }

    pub fn is_drifting(&self) -> bool {
        self.impulse != IVec2::ZERO
    }

    pub fn to_update(&self, entity_id: u32, no_lerp: bool) -> MoveUpdate {
        let mut flags = self.flags;
        flags.set(StateFlags::NO_LERP, no_lerp);
        MoveUpdate {
            entity_id,
            move_number: self.move_number,
            matrix_id: self.matrix_id.0,
            position: [self.position.x, self.position.y],
            impulse: [self.impulse.x, self.impulse.y],
            flags: flags.bits(),
        }
    }
}

/// Where the server believes clients have visually interpolated this entity
/// to. Converges toward the authoritative position; broadcasts are held
/// until it catches up so clients are never told to jump ahead.
#[derive(Debug, Clone, Copy)]
pub struct LerpState {
    pub position: Vec2,
}

impl LerpState {
    /// Beyond this the lerp state is considered desynced and snapped.
    const SNAP_DISTANCE: f32 = 1.5;

    pub fn at(position: IVec2) -> Self {
        Self {
            position: position.as_vec2(),
        }
    }

    pub fn matches(&self, target: IVec2) -> bool {
        self.position == target.as_vec2()
    }

    /// Move toward the authoritative position at `speed` tiles/sec.
    /// Returns true when the target was reached this step.
    pub fn advance(&mut self, target: IVec2, speed: f32, dt: f32) -> bool {
        let goal = target.as_vec2();
        let to_goal = goal - self.position;
        let distance = to_goal.length();

        if distance > Self::SNAP_DISTANCE {
            log::warn!("lerp distance {distance:.2} > {}, snapping", Self::SNAP_DISTANCE);
            self.position = goal;
            return true;
        }

        let step = speed * dt;
        if distance <= step {
            self.position = goal;
        } else {
            self.position += to_goal / distance * step;
        }
        self.position == goal
    }
}

/// One client-submitted move intent, consumed exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAction {
    pub direction: IVec2,
    /// The client's own collision claim for this move.
    pub is_bump: bool,
    /// Not locally predicted by the client (drift initiation).
    pub is_non_predictive: bool,
}

impl PendingAction {
    pub fn new(direction: IVec2) -> Self {
        Self {
            direction,
            is_bump: false,
            is_non_predictive: false,
        }
    }

    pub fn bump(direction: IVec2) -> Self {
        Self {
            direction,
            is_bump: true,
            is_non_predictive: false,
        }
    }
}

impl From<ActionMessage> for PendingAction {
    fn from(msg: ActionMessage) -> Self {
        Self {
            direction: IVec2::new(msg.direction[0] as i32, msg.direction[1] as i32),
            is_bump: msg.is_bump,
            is_non_predictive: msg.is_non_predictive,
        }
    }
}
