//! Network Layer
//!
//! WebSocket server and the single-writer round engine.
//! This layer is **non-deterministic** - all round logic runs through `game/`.

pub mod protocol;
pub mod engine;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, ServerError, ErrorCode};
pub use engine::{EngineCommand, EngineHandle, EngineStopped, RoundEngine};
pub use server::{GameServer, ServerConfig, GameServerError};
