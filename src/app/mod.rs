//! Room-level client state

pub mod room;

pub use room::{ConnectionStatus, RoomController, RoomEvent, VehicleView};
