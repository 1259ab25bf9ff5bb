//! JSON import/export module for decks.
//! A snapshot keeps every card's memory state, so a deck can be moved
//! between stores without resetting the learner's progress.

use crate::error::Result;
use crate::models::{Card, Deck};
use log::info;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Exports a deck to a JSON file at the specified path.
/// Returns an error if file creation or writing fails.
pub fn export_json_to_path(deck: &Deck, path: impl AsRef<Path>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(&mut writer, deck)?;
    writer.flush()?;
    info!(
        "Deck '{}' exported to '{}' ({} cards)",
        deck.name,
        path.as_ref().display(),
        deck.len()
    );
    Ok(())
}

/// Card as it may appear in a snapshot: memory fields are optional so a plain
/// list of question/answer pairs imports as fresh cards.
#[derive(Deserialize)]
struct CardRecord {
    question: String,
    answer: String,
    easiness_factor: Option<f64>,
    repetitions: Option<u32>,
    interval_days: Option<u32>,
    last_reviewed: Option<chrono::NaiveDate>,
}

#[derive(Deserialize)]
struct DeckRecord {
    owner: crate::models::UserId,
    name: String,
    cards: Vec<CardRecord>,
}

/// Imports a deck from a JSON file.
/// Returns an error if the file doesn't exist, contains invalid JSON
/// or repeats a question.
pub fn import_json(path: impl AsRef<Path>) -> Result<Deck> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let record: DeckRecord = serde_json::from_reader(reader)?;

    let mut deck = Deck::new(record.owner, record.name);
    for rec in record.cards {
        let mut card = Card::new(rec.question, rec.answer);
        if let Some(ef) = rec.easiness_factor {
            card.easiness_factor = ef.max(crate::models::flashcard::MIN_EASINESS_FACTOR);
        }
        card.repetitions = rec.repetitions.unwrap_or(0);
        card.interval_days = rec.interval_days.unwrap_or(0);
        card.last_reviewed = rec.last_reviewed;
        deck.add_card(card)?;
    }

    info!(
        "Deck '{}' imported from '{}'",
        deck.name,
        path.as_ref().display()
    );
    Ok(deck)
}
