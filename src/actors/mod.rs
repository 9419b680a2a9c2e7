pub mod announcer;
pub mod game_session;

// Re-export actor types for easier import
pub use announcer::{Announce, DiscordAnnouncer};
pub use game_session::{GameSession, SessionState};
