use glam::IVec2;

use crate::world::{PushableId, WorldMap};

use super::state::{MoveState, PendingAction};

/// What the entity should do as a result of one dequeued action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEffect {
    /// Nothing changes; no notification.
    Stay,
    /// Blocked move: face the attempted direction and try the bump
    /// interaction (door, then push). Position does not advance.
    Bump { facing: IVec2 },
    /// No traction here; if something is in reach, start the space
    /// push/pull exchange. Position does not advance this tick.
    SpaceInteract { pushable: Option<PushableId> },
    /// Plain tile move.
    Moved { next: MoveState, matrix_changed: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepResult {
    /// Client and server disagreed about the collision; the caller must
    /// roll the entity back before anything else.
    pub mismatch: bool,
    pub effect: StepEffect,
}

/// Compute the next authoritative state for one action against the world.
/// Pure with respect to the entity: all mutation is the caller's job.
pub fn next_state(current: &MoveState, action: PendingAction, map: &WorldMap) -> StepResult {
    if action.direction == IVec2::ZERO {
        return StepResult {
            mismatch: false,
            effect: StepEffect::Stay,
        };
    }

    let spatial = map.spatial();
    let target = current.position + action.direction;

    let server_bump = !spatial.is_passable(current.position, target);
    let client_bump = action.is_bump;
    let mismatch = server_bump != client_bump;
    if mismatch {
        log::warn!(
            "bump mismatch, resetting: client={} server={}",
            client_bump,
            server_bump
        );
    }

    if client_bump || server_bump {
        return StepResult {
            mismatch,
            effect: StepEffect::Bump {
                facing: action.direction,
            },
        };
    }

    if spatial.is_non_sticky(current.position) {
        return StepResult {
            mismatch,
            effect: StepEffect::SpaceInteract {
                pushable: spatial.pushable_in_reach(current.position),
            },
        };
    }

    if action.is_non_predictive {
        log::info!("ignored non-predictive action while on solid footing");
        return StepResult {
            mismatch,
            effect: StepEffect::Stay,
        };
    }

    let mut next = *current;
    next.position = target;
    next.move_number = next.move_number.wrapping_add(1);
    next.matrix_id = map.matrix_at(target);

    StepResult {
        mismatch,
        effect: StepEffect::Moved {
            next,
            matrix_changed: next.matrix_id != current.matrix_id,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{MatrixId, TileKind};

    fn station_map() -> (WorldMap, MatrixId) {
        let mut map = WorldMap::new();
        let id = map.add_matrix(100, true);
        for x in 0..8 {
            for y in 0..8 {
                map.set_tile(id, IVec2::new(x, y), TileKind::Floor);
            }
        }
        (map, id)
    }

    #[test]
    fn passable_target_moves() {
        let (map, id) = station_map();
        let current = MoveState::at(IVec2::new(5, 5), id);

        let result = next_state(&current, PendingAction::new(IVec2::new(1, 0)), &map);

        assert!(!result.mismatch);
        match result.effect {
            StepEffect::Moved {
                next,
                matrix_changed,
            } => {
                assert_eq!(next.position, IVec2::new(6, 5));
                assert_eq!(next.move_number, current.move_number + 1);
                assert_eq!(next.matrix_id, id);
                assert!(!matrix_changed);
            }
            other => panic!("expected move, got {other:?}"),
        }
    }

    #[test]
    fn agreed_bump_faces_without_moving() {
        let (mut map, id) = station_map();
        map.set_tile(id, IVec2::new(6, 5), TileKind::Wall);
        let current = MoveState::at(IVec2::new(5, 5), id);

        let result = next_state(&current, PendingAction::bump(IVec2::new(1, 0)), &map);

        assert!(!result.mismatch);
        assert_eq!(
            result.effect,
            StepEffect::Bump {
                facing: IVec2::new(1, 0)
            }
        );
    }

    #[test]
    fn mismatch_when_claims_differ() {
        let (mut map, id) = station_map();
        map.set_tile(id, IVec2::new(6, 5), TileKind::Wall);
        let current = MoveState::at(IVec2::new(5, 5), id);

        // Client claims free passage; server sees a wall.
        let result = next_state(&current, PendingAction::new(IVec2::new(1, 0)), &map);
        assert!(result.mismatch);

        // Client claims a bump that isn't there.
        let result = next_state(&current, PendingAction::bump(IVec2::new(0, 1)), &map);
        assert!(result.mismatch);
        assert_eq!(
            result.effect,
            StepEffect::Bump {
                facing: IVec2::new(0, 1)
            }
        );
    }

    #[test]
    fn non_predictive_ignored_indoors() {
        let (map, id) = station_map();
        let current = MoveState::at(IVec2::new(5, 5), id);
        let action = PendingAction {
            direction: IVec2::new(1, 0),
            is_bump: false,
            is_non_predictive: true,
        };

        let result = next_state(&current, action, &map);
        assert_eq!(result.effect, StepEffect::Stay);
    }

    #[test]
    fn non_sticky_defers_to_space_interaction() {
        let map = WorldMap::new();
        let current = MoveState::at(IVec2::new(20, 20), crate::world::SPACE_MATRIX);

        let result = next_state(&current, PendingAction::new(IVec2::new(1, 0)), &map);
        assert_eq!(result.effect, StepEffect::SpaceInteract { pushable: None });
    }

    #[test]
    fn zero_direction_is_noop() {
        let (map, id) = station_map();
        let current = MoveState::at(IVec2::new(5, 5), id);

        let result = next_state(&current, PendingAction::new(IVec2::ZERO), &map);
        assert_eq!(result.effect, StepEffect::Stay);
        assert!(!result.mismatch);
    }

    #[test]
    fn stepping_off_station_changes_matrix() {
        let (map, id) = station_map();
        let current = MoveState::at(IVec2::new(7, 3), id);

        let result = next_state(&current, PendingAction::new(IVec2::new(1, 0)), &map);
        match result.effect {
            StepEffect::Moved {
                next,
                matrix_changed,
            } => {
                assert!(matrix_changed);
                assert_eq!(next.matrix_id, crate::world::SPACE_MATRIX);
            }
            other => panic!("expected move, got {other:?}"),
        }
    }
}
