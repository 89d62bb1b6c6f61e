pub mod net;
pub mod simulation;
pub mod sync;
pub mod world;

pub use net::{
    ActionMessage, ClientConnection, ConnectionManager, ConnectionState, DEFAULT_PORT,
    DEFAULT_TICK_RATE, MoveUpdate, NetworkEndpoint, Packet, PacketError, PacketHeader, PacketType,
};
pub use simulation::{FixedTimestep, Task, TaskScheduler};
pub use sync::{
    ActionQueue, Admission, DamageSink, EntitySync, Inventory, Item, LerpState, MoveState,
    PendingAction, StateFlags, StateSink, SyncError, SyncWorld,
};
pub use world::{
    Door, DoorId, Matrix, MatrixId, Pushable, PushableId, RotationEvent, SpatialQuery, Tile,
    TileKind, WorldMap, SPACE_MATRIX,
};
