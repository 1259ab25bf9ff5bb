//! Collaborators the review engine talks to, and the events it receives.

use crate::error::Result;
use crate::models::{Card, Deck, OptionLabel, Question, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable home of the learners' decks.
#[async_trait]
pub trait DeckProvider: Send + Sync {
    async fn load_deck(&self, user: UserId) -> Result<Deck>;

    /// Stores the given cards, matched by question. Saving the same cards twice
    /// must leave the same state as saving them once.
    async fn save_cards(&self, user: UserId, cards: &[Card]) -> Result<()>;
}

/// Opaque reference to a message shown to the learner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionHandle(pub String);

/// Whatever shows questions and messages to the learner.
#[async_trait]
pub trait PresentationSink: Send + Sync {
    async fn show_question(&self, user: UserId, question: &Question) -> Result<QuestionHandle>;

    async fn show_message(&self, user: UserId, text: &str) -> Result<()>;
}

/// A button press coming back from the learner.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEvent {
    pub user_id: UserId,
    /// Session of the question being answered, as sent in [`Question::session_id`].
    pub session_id: u64,
    /// Position of the question being answered, as sent in [`Question::position`].
    pub position: usize,
    pub label: OptionLabel,
    pub text: String,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StartOutcome {
    /// Nothing is due; the learner was told so and no session exists.
    NothingDue,
    Started(Question),
    /// A session was already running; its current question was shown again.
    Resumed(Question),
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnswerOutcome {
    /// No session, or the answer was a duplicate of one already graded.
    Ignored,
    Next(Question),
    /// Cards were flushed and a new pass over still-due cards started.
    NextRound(Question),
    /// Cards were flushed and the session is gone.
    Finished { saved: usize },
}
