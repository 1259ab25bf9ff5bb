pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod models;
pub mod session;

pub use error::{Result, ReviewError};
pub use models::{Card, Deck, Quality, ReviewSession};
pub use session::ReviewEngine;
