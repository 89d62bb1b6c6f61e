use crate::net::MoveUpdate;

use super::state::{MoveState, StateFlags};

/// Outbound seam for state broadcasts. The server implements this over its
/// UDP endpoint; tests record what would have gone out.
pub trait StateSink {
    fn send_to_all(&mut self, update: MoveUpdate);
    fn send_to(&mut self, observer: u32, update: MoveUpdate);
}

/// Broadcast the state to every observer unless suppressed.
///
/// Mid-drift updates carry no information clients can't extrapolate, so
/// they are dropped unless flagged important (sudden course change).
/// On an actual send the edge-triggered flags are consumed.
/// Returns whether a message went out.
pub fn notify_all(sink: &mut dyn StateSink, entity_id: u32, state: &mut MoveState) -> bool {
    if state.is_drifting() && !state.flags.contains(StateFlags::IMPORTANT) {
        return false;
    }

    sink.send_to_all(state.to_update(entity_id, false));
    state
        .flags
        .remove(StateFlags::IMPORTANT | StateFlags::RESET_QUEUE);
    true
}

/// Send the state to a single observer. Never suppressed and never consumes
/// the edge flags; used for initial sync of a newly connecting observer.
pub fn notify_one(
    sink: &mut dyn StateSink,
    observer: u32,
    entity_id: u32,
    state: &MoveState,
    no_lerp: bool,
) {
    sink.send_to(observer, state.to_update(entity_id, no_lerp));
}
