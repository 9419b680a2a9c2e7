use miette::Diagnostic;
use thiserror::Error;

use crate::room::RoomId;

/// Primary error type for the trivia bot
#[derive(Error, Debug, Diagnostic)]
pub enum BotError {
    #[error("Discord API error: {0}")]
    #[diagnostic(code(triviabot::discord_error))]
    Discord(#[from] serenity::Error),

    #[error("Environment configuration error: {0}")]
    #[diagnostic(code(triviabot::config_error))]
    Config(String),

    #[error("Store error: {0}")]
    #[diagnostic(code(triviabot::store_error))]
    Store(#[from] StoreError),

    #[error("Session error: {0}")]
    #[diagnostic(code(triviabot::session_error))]
    Session(#[from] SessionError),

    #[error("Actor system error: {0}")]
    #[diagnostic(code(triviabot::actor_error))]
    Actor(String),
}

/// Durable store errors
#[derive(Error, Debug, Diagnostic)]
pub enum StoreError {
    #[error("Database error: {0}")]
    #[diagnostic(code(triviabot::store::database))]
    Database(#[from] sqlx::Error),

    #[error("Write contention during {operation} persisted after {attempts} attempt(s)")]
    #[diagnostic(
        code(triviabot::store::conflict),
        help("another session is holding the database lock; try again later")
    )]
    Conflict {
        operation: &'static str,
        attempts: u32,
    },
}

/// Errors raised when a game session cannot start
#[derive(Error, Debug, Diagnostic)]
pub enum SessionError {
    #[error("A trivia game is already in progress in {0}")]
    #[diagnostic(code(triviabot::session::already_running))]
    AlreadyRunning(RoomId),

    #[error("Invalid question count: {0}")]
    #[diagnostic(
        code(triviabot::session::invalid_question_count),
        help("ask for at least one question")
    )]
    InvalidQuestionCount(usize),

    #[error("The question bank is empty")]
    #[diagnostic(code(triviabot::session::empty_question_bank))]
    EmptyQuestionBank,
}

pub use BotError as Error;

/// Create a result type that uses our error type
pub type Result<T> = std::result::Result<T, Error>;
