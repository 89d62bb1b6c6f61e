mod matrix;
mod objects;
mod spatial;
mod tile;

pub use matrix::{Matrix, MatrixId, RotationEvent, RotationHub, RotationSubscription, SPACE_MATRIX};
pub use objects::{Door, DoorId, Pushable, PushableId};
pub use spatial::SpatialQuery;
pub use tile::{Tile, TileKind};

use std::collections::HashMap;

use glam::IVec2;

/// The simulation's world context: reference frames, their tiles, and the
/// dynamic occupants (pushables, doors). Passed explicitly to whoever needs
/// it; owns nothing entity-specific.
#[derive(Debug)]
pub struct WorldMap {
    matrices: Vec<Matrix>,
    pushables: HashMap<PushableId, Pushable>,
    doors: HashMap<DoorId, Door>,
    next_matrix_id: u32,
    next_object_id: u32,
}

impl Default for WorldMap {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldMap {
    pub fn new() -> Self {
        Self {
            matrices: vec![Matrix::new(SPACE_MATRIX, 0, false)],
            pushables: HashMap::new(),
            doors: HashMap::new(),
            next_matrix_id: 1,
            next_object_id: 1,
        }
    }

    pub fn add_matrix(&mut self, net_id: u64, gravity: bool) -> MatrixId {
        let id = MatrixId(self.next_matrix_id);
        self.next_matrix_id += 1;
        self.matrices.push(Matrix::new(id, net_id, gravity));
        id
    }

    pub fn matrix(&self, id: MatrixId) -> Option<&Matrix> {
        self.matrices.iter().find(|m| m.id == id)
    }

    pub fn matrix_mut(&mut self, id: MatrixId) -> Option<&mut Matrix> {
        self.matrices.iter_mut().find(|m| m.id == id)
    }

    /// Which reference frame owns a world position. Station matrices win over
    /// the space background; among stations, first registered wins.
    pub fn matrix_at(&self, pos: IVec2) -> MatrixId {
        self.matrices
            .iter()
            .find(|m| m.id != SPACE_MATRIX && m.covers(pos))
            .map(|m| m.id)
            .unwrap_or(SPACE_MATRIX)
    }

    pub fn set_tile(&mut self, matrix_id: MatrixId, pos: IVec2, kind: TileKind) {
        if let Some(matrix) = self.matrix_mut(matrix_id) {
            matrix.set_tile(pos, kind);
        }
    }

    pub fn spatial(&self) -> SpatialQuery<'_> {
        SpatialQuery::new(self)
    }

    pub(crate) fn matrices(&self) -> &[Matrix] {
        &self.matrices
    }

    pub fn spawn_pushable(&mut self, position: IVec2, is_solid: bool) -> PushableId {
        let id = PushableId(self.next_object_id);
        self.next_object_id += 1;
        self.pushables.insert(id, Pushable::new(id, position, is_solid));
        id
    }

    pub fn pushable(&self, id: PushableId) -> Option<&Pushable> {
        self.pushables.get(&id)
    }

    pub fn pushable_mut(&mut self, id: PushableId) -> Option<&mut Pushable> {
        self.pushables.get_mut(&id)
    }

    pub fn pushables(&self) -> impl Iterator<Item = &Pushable> {
        self.pushables.values()
    }

    pub fn spawn_door(&mut self, position: IVec2) -> DoorId {
        let id = DoorId(self.next_object_id);
        self.next_object_id += 1;
        self.doors.insert(id, Door::new(id, position));
        id
    }

    pub fn door(&self, id: DoorId) -> Option<&Door> {
        self.doors.get(&id)
    }

    pub fn door_mut(&mut self, id: DoorId) -> Option<&mut Door> {
        self.doors.get_mut(&id)
    }

    pub(crate) fn doors(&self) -> impl Iterator<Item = &Door> {
        self.doors.values()
    }

    /// Collect pending rotation events from every frame.
    pub fn drain_rotation_events(&mut self) -> Vec<RotationEvent> {
        let mut events = Vec::new();
        for matrix in &mut self.matrices {
            events.append(&mut matrix.rotation_mut().drain_events());
        }
        events
    }

    /// Resolve one queued push immediately. Returns false for a zero
    /// direction or a blocked target.
    pub fn try_push_object(&mut self, id: PushableId, direction: IVec2) -> bool {
        if direction == IVec2::ZERO {
            return false;
        }
        let Some(pushable) = self.pushables.get(&id) else {
            return false;
        };
        let from = pushable.position;
        let to = from + direction;
        if !self.spatial().is_passable_excluding(from, to, Some(id)) {
            return false;
        }
        let drifts = self.spatial().is_non_sticky(to);

        let pushable = self.pushables.get_mut(&id).expect("checked above");
        pushable.position = to;
        pushable.impulse = if drifts { direction } else { IVec2::ZERO };
        pushable.notify();
        log::trace!("pushed {:?} to {}", id, to);
        true
    }

    /// Advance pushables one simulation step: consume one queued push each,
    /// then let floating ones coast along their impulse until blocked.
    pub fn step_pushables(&mut self) {
        let ids: Vec<PushableId> = self.pushables.keys().copied().collect();
        for id in ids {
            let queued = self
                .pushables
                .get_mut(&id)
                .and_then(|p| p.take_queued_push());
            if let Some(direction) = queued {
                self.try_push_object(id, direction);
                continue;
            }

            let Some(pushable) = self.pushables.get(&id) else {
                continue;
            };
            if !pushable.is_floating() {
                continue;
            }
            let from = pushable.position;
            let impulse = pushable.impulse;
            let to = from + impulse;
            if self.spatial().is_passable_excluding(from, to, Some(id)) {
                let keeps_drifting = self.spatial().is_non_sticky(to);
                let pushable = self.pushables.get_mut(&id).expect("checked above");
                pushable.position = to;
                if !keeps_drifting {
                    pushable.impulse = IVec2::ZERO;
                }
                pushable.notify();
            } else {
                self.pushables.get_mut(&id).expect("checked above").stop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(map: &mut WorldMap) -> MatrixId {
        let id = map.add_matrix(100, true);
        for x in 0..8 {
            for y in 0..8 {
                map.set_tile(id, IVec2::new(x, y), TileKind::Floor);
            }
        }
        id
    }

    #[test]
    fn matrix_lookup_prefers_station() {
        let mut map = WorldMap::new();
        let id = station(&mut map);

        assert_eq!(map.matrix_at(IVec2::new(3, 3)), id);
        assert_eq!(map.matrix_at(IVec2::new(50, 50)), SPACE_MATRIX);
    }

    #[test]
    fn push_moves_object_one_tile() {
        let mut map = WorldMap::new();
        station(&mut map);
        let id = map.spawn_pushable(IVec2::new(2, 2), true);

        assert!(map.try_push_object(id, IVec2::new(1, 0)));
        assert_eq!(map.pushable(id).unwrap().position, IVec2::new(3, 2));
        // Indoors: impulse consumed after one tile.
        assert!(!map.pushable(id).unwrap().is_floating());
    }

    #[test]
    fn push_into_space_keeps_drifting() {
        let mut map = WorldMap::new();
        station(&mut map);
        let id = map.spawn_pushable(IVec2::new(7, 3), true);

        assert!(map.try_push_object(id, IVec2::new(1, 0)));
        assert!(map.pushable(id).unwrap().is_floating());

        map.step_pushables();
        assert_eq!(map.pushable(id).unwrap().position, IVec2::new(9, 3));
    }

    #[test]
    fn zero_direction_push_is_noop() {
        let mut map = WorldMap::new();
        station(&mut map);
        let id = map.spawn_pushable(IVec2::new(2, 2), true);

        assert!(!map.try_push_object(id, IVec2::ZERO));
        assert_eq!(map.pushable(id).unwrap().position, IVec2::new(2, 2));
    }

    #[test]
    fn blocked_push_fails() {
        let mut map = WorldMap::new();
        let id = station(&mut map);
        map.set_tile(id, IVec2::new(3, 2), TileKind::Wall);
        let pushable = map.spawn_pushable(IVec2::new(2, 2), true);

        assert!(!map.try_push_object(pushable, IVec2::new(1, 0)));
        assert_eq!(map.pushable(pushable).unwrap().position, IVec2::new(2, 2));
    }
}
