//! Recall quality grades and how they are inferred from a multiple-choice answer.
//!
//! The learner never rates themselves: a correct answer is graded 5, 4 or 3 depending
//! on how long it took, a wrong one 2 or 1, and the reserved blackout input is always 0.

use crate::config::GradingConfig;
use crate::error::{Result, ReviewError};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// SM-2 quality grade, always within 0..=5.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Quality(u8);

impl Quality {
    pub const BLACKOUT: Quality = Quality(0);
    pub const PERFECT: Quality = Quality(5);

    pub fn new(value: u8) -> Result<Self> {
        if value <= 5 {
            Ok(Self(value))
        } else {
            Err(ReviewError::InvalidGrade(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Grades of 3 and above count as a successful recall.
    pub fn is_pass(self) -> bool {
        self.0 >= 3
    }
}

impl TryFrom<u8> for Quality {
    type Error = ReviewError;

    fn try_from(value: u8) -> Result<Self> {
        Quality::new(value)
    }
}

impl From<Quality> for u8 {
    fn from(quality: Quality) -> u8 {
        quality.0
    }
}

/// What the chosen button stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OptionLabel {
    CorrectAnswer,
    IncorrectAnswer,
    Blackout,
}

/// Converts the answer's correctness and latency into a grade.
pub fn grade_answer(label: OptionLabel, elapsed: Duration, config: &GradingConfig) -> Quality {
    // Clock skew can make elapsed negative, treat that as instant
    let elapsed = elapsed.max(Duration::zero());

    let value = match label {
        OptionLabel::Blackout => 0,
        OptionLabel::CorrectAnswer if elapsed < config.fast_answer => 5,
        OptionLabel::CorrectAnswer if elapsed < config.slow_answer => 4,
        OptionLabel::CorrectAnswer => 3,
        OptionLabel::IncorrectAnswer if elapsed < config.fast_answer => 2,
        OptionLabel::IncorrectAnswer => 1,
    };
    Quality(value)
}
