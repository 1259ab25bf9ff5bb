pub mod deck;
pub mod flashcard;
pub mod quality;
pub mod reminder;
pub mod review_session;
pub mod sm2;

pub use deck::{Deck, UserId};
pub use flashcard::Card;
pub use quality::{OptionLabel, Quality};
pub use reminder::ReminderSchedule;
pub use review_session::{AnswerOption, Question, ReviewSession, SessionKind, SessionState};
