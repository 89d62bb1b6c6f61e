use rkyv::{rancor, Archive, Deserialize, Serialize};

pub const MAX_PACKET_SIZE: usize = 1200;
pub const PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x41445246;
pub const DEFAULT_PORT: u16 = 27020;
pub const DEFAULT_TICK_RATE: u32 = 30;

const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct PacketHeader {
    pub magic: u32,
    pub version: u32,
    pub sequence: u32,
}

impl PacketHeader {
    pub fn new(sequence: u32) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
            sequence,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

/// A single client move intent. Directions are clamped to one tile per axis.
#[derive(Debug, Clone, Copy, Default, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ActionMessage {
    pub direction: [i8; 2],
    pub is_bump: bool,
    pub is_non_predictive: bool,
}

impl ActionMessage {
    pub fn new(dx: i8, dy: i8) -> Self {
        Self {
            direction: [dx.clamp(-1, 1), dy.clamp(-1, 1)],
            is_bump: false,
            is_non_predictive: false,
        }
    }
}

/// Authoritative state broadcast for one entity.
///
/// `move_number` lets clients drop predicted moves the server has already
/// confirmed; the flag bits carry the one-shot lerp/reset hints.
#[derive(Debug, Clone, Copy, Default, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct MoveUpdate {
    pub entity_id: u32,
    pub move_number: u32,
    pub matrix_id: u32,
    pub position: [i32; 2],
    pub impulse: [i32; 2],
    pub flags: u8,
}

impl MoveUpdate {
    pub const FLAG_IMPORTANT: u8 = 1 << 0;
    pub const FLAG_RESET_QUEUE: u8 = 1 << 1;
    pub const FLAG_NO_LERP: u8 = 1 << 2;

    #[inline]
    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum PacketType {
    ConnectionRequest {
        client_salt: u64,
    },
    ConnectionAccepted {
        client_id: u32,
        entity_id: u32,
    },
    ConnectionDenied {
        reason: String,
    },
    SubmitAction {
        entity_id: u32,
        action: ActionMessage,
    },
    ValidatePush {
        entity_id: u32,
        pushable_id: u32,
    },
    StateUpdate(MoveUpdate),
    Ping {
        timestamp: u64,
    },
    Pong {
        timestamp: u64,
    },
    Disconnect,
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: PacketType,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
}

impl Packet {
    pub fn new(header: PacketHeader, payload: PacketType) -> Self {
        Self { header, payload }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(PacketError::Serialize)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        rkyv::from_bytes::<Self, rancor::Error>(data).map_err(PacketError::Deserialize)
    }
}
