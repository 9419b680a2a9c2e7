pub mod hints;
pub mod question;
pub mod source;

// Re-export common types
pub use hints::{Difficulty, Hints};
pub use question::Question;
pub use source::QuestionSource;
