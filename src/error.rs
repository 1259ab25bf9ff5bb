//! Error type shared by the scheduler, the session machine and the stores.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Invalid quality grade {0}, expected 0-5")]
    InvalidGrade(u8),

    #[error("Failed to persist cards: {0}")]
    Persistence(String),

    #[error("Failed to present to user: {0}")]
    Presentation(String),

    #[error("Deck already contains question '{0}'")]
    DuplicateQuestion(String),

    #[error("Invalid reminder time '{0}', expected HH:MM")]
    InvalidReminderTime(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReviewError>;
