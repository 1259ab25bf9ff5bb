//! Flashcard is a pair <question, answer> plus its SM-2 memory state.
//! The question text identifies the card inside its deck.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_EASINESS_FACTOR: f64 = 2.5;
pub const MIN_EASINESS_FACTOR: f64 = 1.3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub question: String,
    pub answer: String,
    pub easiness_factor: f64,
    pub repetitions: u32,
    pub interval_days: u32,
    /// Day of the last review; `interval_days` counts from here.
    pub last_reviewed: Option<NaiveDate>,
}

impl Card {
    /// A card that was never reviewed, so it is due immediately.
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            easiness_factor: DEFAULT_EASINESS_FACTOR,
            repetitions: 0,
            interval_days: 0,
            last_reviewed: None,
        }
    }

    /// Date on which the card becomes due, `None` if it was never reviewed.
    pub fn due_date(&self) -> Option<NaiveDate> {
        self.last_reviewed
            .and_then(|d| d.checked_add_days(chrono::Days::new(self.interval_days as u64)))
    }
}
