mod endpoint;
mod protocol;

pub use endpoint::{
    ClientConnection, ConnectionManager, ConnectionState, NetworkEndpoint, ReceiveTracker,
};
pub use protocol::{
    sequence_greater_than, ActionMessage, MoveUpdate, Packet, PacketError, PacketHeader,
    PacketType, DEFAULT_PORT, DEFAULT_TICK_RATE, MAX_PACKET_SIZE, PROTOCOL_MAGIC,
    PROTOCOL_VERSION,
};
