use glam::IVec2;

use crate::world::WorldMap;

use super::replicate::{self, StateSink};
use super::state::StateFlags;
use super::EntitySync;

/// Alternating pushes needed to align an entity and a grabbed object along
/// the impulse axis. Stand-in for a real alignment-distance calculation.
pub const SPACE_PUSH_CHAIN_STEPS: u32 = 5;

/// Server-side free-floating model, run every tick before the action queue
/// is touched. Starts a drift when traction is lost with residual motion,
/// keeps extending the goal one impulse step at a time while clients lerp,
/// and ends it the moment footing or an obstacle shows up.
pub(super) fn check_movement(sync: &mut EntitySync, map: &mut WorldMap, sink: &mut dyn StateSink) {
    let position = sync.state.position;

    if map.spatial().is_non_sticky(position) {
        if !sync.state.is_drifting() && sync.last_direction != IVec2::ZERO {
            // Walked off an edge with momentum: server-initiated space dive.
            sync.state.impulse = sync.last_direction;
            sync.state.flags |= StateFlags::IMPORTANT | StateFlags::RESET_QUEUE;
            log::info!(
                "entity {} started drifting {:?}",
                sync.entity_id,
                sync.state.impulse
            );
        }

        // Perpetual floating sim: only extend once clients caught up.
        if sync.lerp.matches(sync.state.position) {
            if sync.state.is_drifting() && sync.state.flags.contains(StateFlags::IMPORTANT) {
                replicate::notify_all(sink, sync.entity_id, &mut sync.state);
            } else if sync.state.is_drifting() {
                let goal = sync.state.position + sync.state.impulse;
                if map.spatial().is_passable(sync.state.position, goal) {
                    sync.state.position = goal;
                    let new_matrix = map.matrix_at(goal);
                    if new_matrix != sync.state.matrix_id {
                        sync.state.matrix_id = new_matrix;
                        sync.resubscribe(map, new_matrix);
                    }
                    // Drift is self-perpetuating; queued inputs are stale.
                    sync.queue.clear();
                } else {
                    stop(sync, map, sink);
                }
            }
        }
    }

    if sync.state.is_drifting() && !map.spatial().is_floating_at(sync.state.position) {
        stop(sync, map, sink);
    }
}

/// Terminate a drift. Grabs a companion object sharing the impulse (both
/// snap and halt together), zeroes the residual direction, and forces a
/// queue-resetting broadcast.
pub(super) fn stop(sync: &mut EntitySync, map: &mut WorldMap, sink: &mut dyn StateSink) {
    if !sync.state.is_drifting() {
        return;
    }

    if let Some(id) = map.spatial().pushable_in_reach(sync.state.position) {
        let grab = map
            .pushable(id)
            .is_some_and(|p| p.is_solid && p.is_floating() && p.impulse == sync.state.impulse);
        if grab {
            // Both halt together, with the object snapped into reach along
            // the travel axis so it does not stop a tile out of line.
            let aligned = sync.state.position + sync.state.impulse;
            let pushable = map.pushable_mut(id).expect("checked above");
            log::trace!(
                "entity {} caught {:?} at {}, snapping to {}",
                sync.entity_id,
                id,
                pushable.position,
                aligned
            );
            pushable.set_position(aligned);
            pushable.stop();
        }
    }

    // No auto-continuation after hitting something.
    sync.last_direction = IVec2::ZERO;

    sync.state.impulse = IVec2::ZERO;
    sync.state.flags |= StateFlags::RESET_QUEUE;
    sync.state.move_number = sync.state.move_number.wrapping_add(1);

    replicate::notify_all(sink, sync.entity_id, &mut sync.state);
}
