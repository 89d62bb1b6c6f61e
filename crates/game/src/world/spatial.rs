use glam::IVec2;

use super::matrix::SPACE_MATRIX;
use super::objects::{DoorId, PushableId};
use super::WorldMap;

/// Read-only passability/occupancy oracle over the world map. All checks
/// follow the "missing tile reads as open space" convention.
pub struct SpatialQuery<'a> {
    map: &'a WorldMap,
}

impl<'a> SpatialQuery<'a> {
    pub(crate) fn new(map: &'a WorldMap) -> Self {
        Self { map }
    }

    /// Can an entity transit from `from` onto `to`? Blocked by impassable
    /// tiles on any frame, closed doors, and solid occupants.
    pub fn is_passable(&self, from: IVec2, to: IVec2) -> bool {
        self.is_passable_excluding(from, to, None)
    }

    pub fn is_passable_excluding(
        &self,
        _from: IVec2,
        to: IVec2,
        exclude: Option<PushableId>,
    ) -> bool {
        let tiles_passable = self
            .map
            .matrices()
            .iter()
            .all(|m| m.tile_at(to).is_none_or(|t| t.is_passable()));
        if !tiles_passable {
            return false;
        }

        if self
            .map
            .doors()
            .any(|d| d.position == to && !d.is_passable())
        {
            return false;
        }

        !self
            .map
            .pushables()
            .any(|p| p.position == to && p.is_solid && Some(p.id) != exclude)
    }

    /// Vacuum check: true when every frame's tile here is open to space.
    pub fn is_space(&self, pos: IVec2) -> bool {
        self.map
            .matrices()
            .iter()
            .all(|m| m.tile_at(pos).is_none_or(|t| t.is_space()))
    }

    /// Tile-based traction check: no frame offers footing here.
    pub fn is_non_sticky(&self, pos: IVec2) -> bool {
        !self
            .map
            .matrices()
            .iter()
            .any(|m| m.tile_at(pos).is_some_and(|t| t.has_footing()))
    }

    /// Gravity-based weightlessness: the owning frame has no gravity.
    /// Independent from [`is_non_sticky`](Self::is_non_sticky); a powered-down
    /// shuttle has tiles to grip but nothing pulling you onto them.
    pub fn is_floating_at(&self, pos: IVec2) -> bool {
        let owner = self.map.matrix_at(pos);
        owner == SPACE_MATRIX
            || self
                .map
                .matrix(owner)
                .is_none_or(|m| !m.gravity)
    }

    /// Solid pushables at a tile, in stable id order for deterministic
    /// push resolution.
    pub fn solid_occupants_at(&self, pos: IVec2) -> Vec<PushableId> {
        let mut ids: Vec<PushableId> = self
            .map
            .pushables()
            .filter(|p| p.position == pos && p.is_solid)
            .map(|p| p.id)
            .collect();
        ids.sort_by_key(|id| id.0);
        ids
    }

    pub fn first_door_at(&self, pos: IVec2) -> Option<DoorId> {
        let mut ids: Vec<DoorId> = self
            .map
            .doors()
            .filter(|d| d.position == pos)
            .map(|d| d.id)
            .collect();
        ids.sort_by_key(|id| id.0);
        ids.first().copied()
    }

    /// Nearest solid pushable within arm's reach (Chebyshev distance 1).
    pub fn pushable_in_reach(&self, pos: IVec2) -> Option<PushableId> {
        let mut candidates: Vec<(i32, PushableId)> = self
            .map
            .pushables()
            .filter(|p| p.is_solid && in_reach(pos, p.position))
            .map(|p| {
                let d = (p.position - pos).abs();
                (d.x.max(d.y), p.id)
            })
            .collect();
        candidates.sort_by_key(|&(dist, id)| (dist, id.0));
        candidates.first().map(|&(_, id)| id)
    }

    pub fn in_reach_of(&self, pos: IVec2, target: IVec2) -> bool {
        in_reach(pos, target)
    }
}

fn in_reach(a: IVec2, b: IVec2) -> bool {
    let d = (a - b).abs();
    d.x <= 1 && d.y <= 1
}
