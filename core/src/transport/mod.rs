// Transport module — the room contract and in-process implementations

pub mod abstraction;
pub mod memory;
pub mod offline;

pub use abstraction::{JoinedRoom, Room, RoomConnector, RoomEvent, RoomEvents, TransportError};
pub use memory::{MemoryConnector, MemoryHub, MemoryRoom};
pub use offline::OfflineRoom;
