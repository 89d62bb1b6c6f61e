use std::collections::HashMap;

use glam::IVec2;
use serde::{Deserialize, Serialize};

use super::tile::{Tile, TileKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatrixId(pub u32);

/// The background frame every position falls back to when no station
/// matrix covers it.
pub const SPACE_MATRIX: MatrixId = MatrixId(0);

/// A reference frame an entity can stand on: a station, a shuttle, or the
/// space background. Tiles are keyed by world position.
#[derive(Debug)]
pub struct Matrix {
    pub id: MatrixId,
    /// Network identity clients use to parent the entity to this frame.
    pub net_id: u64,
    pub gravity: bool,
    tiles: HashMap<IVec2, Tile>,
    rotation: RotationHub,
}

impl Matrix {
    pub fn new(id: MatrixId, net_id: u64, gravity: bool) -> Self {
        Self {
            id,
            net_id,
            gravity,
            tiles: HashMap::new(),
            rotation: RotationHub::default(),
        }
    }

    pub fn set_tile(&mut self, pos: IVec2, kind: TileKind) {
        self.tiles.insert(pos, Tile::from_kind(kind));
    }

    pub fn tile_at(&self, pos: IVec2) -> Option<&Tile> {
        self.tiles.get(&pos)
    }

    pub fn covers(&self, pos: IVec2) -> bool {
        self.tiles.contains_key(&pos)
    }

    pub fn rotation_mut(&mut self) -> &mut RotationHub {
        &mut self.rotation
    }

    pub fn rotation(&self) -> &RotationHub {
        &self.rotation
    }
}

/// Fired when a frame rotates; subscribers adjust entity facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationEvent {
    pub matrix_id: MatrixId,
    pub degrees: i32,
    pub entity_id: u32,
}

/// Owned handle for a rotation subscription. Exactly one per entity per
/// occupied matrix; released and re-acquired within the same tick on a
/// matrix change.
#[derive(Debug, PartialEq, Eq)]
pub struct RotationSubscription {
    pub matrix_id: MatrixId,
    token: u64,
}

#[derive(Debug, Default)]
pub struct RotationHub {
    subscribers: HashMap<u64, u32>,
    next_token: u64,
    pending: Vec<RotationEvent>,
}

impl RotationHub {
    pub fn subscribe(&mut self, matrix_id: MatrixId, entity_id: u32) -> RotationSubscription {
        let token = self.next_token;
        self.next_token += 1;
        self.subscribers.insert(token, entity_id);
        RotationSubscription { matrix_id, token }
    }

    pub fn unsubscribe(&mut self, subscription: RotationSubscription) {
        self.subscribers.remove(&subscription.token);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn rotate(&mut self, matrix_id: MatrixId, degrees: i32) {
        for (_, &entity_id) in self.subscribers.iter() {
            self.pending.push(RotationEvent {
                matrix_id,
                degrees,
                entity_id,
            });
        }
    }

    pub fn drain_events(&mut self) -> Vec<RotationEvent> {
        std::mem::take(&mut self.pending)
    }
}
