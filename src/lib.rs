pub mod actors;
pub mod config;
pub mod discord;
pub mod error;
pub mod quiz;
pub mod registry;
pub mod room;
pub mod scoreboard;
pub mod store;

// Re-export error types for convenience
pub use error::{Error, Result, SessionError, StoreError};
pub use room::RoomId;

// Common types used across the application
pub struct Data {
    pub registry: registry::SessionRegistry,
}
