use serde::{Deserialize, Serialize};

/// Static tile data. Absence of a tile on every matrix reads as open space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub passable: bool,
    pub atmos_passable: bool,
    pub sealed: bool,
    /// Whether an entity standing here has traction. Grating outside the
    /// hull gives footing even though the tile is open to vacuum.
    pub footing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    Floor,
    Wall,
    Lattice,
    Space,
}

impl Tile {
    pub fn from_kind(kind: TileKind) -> Self {
        match kind {
            TileKind::Floor => Self {
                passable: true,
                atmos_passable: true,
                sealed: true,
                footing: true,
            },
            TileKind::Wall => Self {
                passable: false,
                atmos_passable: false,
                sealed: true,
                footing: false,
            },
            TileKind::Lattice => Self {
                passable: true,
                atmos_passable: true,
                sealed: false,
                footing: true,
            },
            TileKind::Space => Self {
                passable: true,
                atmos_passable: true,
                sealed: false,
                footing: false,
            },
        }
    }

    pub fn is_passable(&self) -> bool {
        self.passable
    }

    pub fn is_atmos_passable(&self) -> bool {
        self.atmos_passable
    }

    pub fn is_space(&self) -> bool {
        self.atmos_passable && !self.sealed
    }

    pub fn has_footing(&self) -> bool {
        self.footing
    }
}
