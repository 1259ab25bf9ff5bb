//! Review sessions: the async engine, its per-user store and the collaborator traits.

pub mod engine;
pub mod ports;
pub mod store;

pub use engine::ReviewEngine;
pub use ports::{
    AnswerEvent, AnswerOutcome, DeckProvider, PresentationSink, QuestionHandle, StartOutcome,
};
pub use store::SessionStore;
