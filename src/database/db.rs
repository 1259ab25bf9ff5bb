//! Database operations for the review engine
//!
//! Handles SQLite database initialization, deck and card storage with their
//! SM-2 memory state, and per-user reminder times.

use crate::error::{Result, ReviewError};
use crate::models::reminder::parse_reminder_time;
use crate::models::{Card, Deck, ReminderSchedule, UserId};
use crate::session::DeckProvider;
use async_trait::async_trait;
use chrono::NaiveTime;
use log::{debug, info};
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::{Arc, Mutex, MutexGuard};

pub const DEFAULT_DECK_NAME: &str = "My Deck";

/// Opens (or creates) the database file and makes sure the schema exists
pub fn init_database(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    info!("Opened database at {}", path);
    Ok(conn)
}

/// Creates tables for decks, cards with their SM-2 state, and reminders
pub fn init_schema(conn: &Connection) -> Result<()> {
    // One deck per learner
    conn.execute(
        "CREATE TABLE IF NOT EXISTS decks (
            owner INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        )",
        (),
    )?;

    // Cards are identified by their question within the owner's deck
    conn.execute(
        "CREATE TABLE IF NOT EXISTS cards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner INTEGER NOT NULL,
            question TEXT NOT NULL,
            answer TEXT NOT NULL,
            easiness_factor REAL NOT NULL DEFAULT 2.5,
            interval_days INTEGER NOT NULL DEFAULT 0,
            repetitions INTEGER NOT NULL DEFAULT 0,
            last_reviewed TEXT,
            FOREIGN KEY (owner) REFERENCES decks(owner),
            UNIQUE(owner, question)
        )",
        (),
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS reminders (
            owner INTEGER PRIMARY KEY,
            time TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

/// Creates the learner's deck, or renames it if it already exists
pub fn new_deck(owner: UserId, name: &str, conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT INTO decks (owner, name) VALUES (?1, ?2)
         ON CONFLICT(owner) DO UPDATE SET name = excluded.name",
        params![owner, name],
    )?;
    debug!("Deck '{}' ready for user {}", name, owner);
    Ok(())
}

/// Adds a card to the learner's deck, creating the deck if needed
///
/// Returns the card row ID. A question already in the deck is rejected.
pub fn add_card(owner: UserId, card: &Card, conn: &Connection) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO decks (owner, name) VALUES (?1, ?2)",
        params![owner, DEFAULT_DECK_NAME],
    )?;

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO cards
            (owner, question, answer, easiness_factor, interval_days, repetitions, last_reviewed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            owner,
            card.question,
            card.answer,
            card.easiness_factor,
            card.interval_days,
            card.repetitions,
            card.last_reviewed
        ],
    )?;
    if inserted == 0 {
        return Err(ReviewError::DuplicateQuestion(card.question.clone()));
    }

    Ok(conn.last_insert_rowid())
}

/// Loads the learner's deck with every card in insertion order
///
/// A learner without a deck gets an empty one.
pub fn load_deck(owner: UserId, conn: &Connection) -> Result<Deck> {
    let name: Option<String> = conn
        .query_row(
            "SELECT name FROM decks WHERE owner = ?1",
            params![owner],
            |row| row.get(0),
        )
        .optional()?;

    let mut stmt = conn.prepare(
        "SELECT question, answer, easiness_factor, interval_days, repetitions, last_reviewed
         FROM cards WHERE owner = ?1 ORDER BY id ASC",
    )?;
    let cards = stmt
        .query_map(params![owner], |row| {
            Ok(Card {
                question: row.get(0)?,
                answer: row.get(1)?,
                easiness_factor: row.get(2)?,
                interval_days: row.get(3)?,
                repetitions: row.get(4)?,
                last_reviewed: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<Card>>>()?;

    Ok(Deck {
        owner,
        name: name.unwrap_or_else(|| DEFAULT_DECK_NAME.to_string()),
        cards,
    })
}

/// Writes the memory state of reviewed cards in one transaction
///
/// Upserts by (owner, question), so saving the same cards again is harmless.
pub fn save_cards(owner: UserId, cards: &[Card], conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT OR IGNORE INTO decks (owner, name) VALUES (?1, ?2)",
        params![owner, DEFAULT_DECK_NAME],
    )?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO cards
                (owner, question, answer, easiness_factor, interval_days, repetitions,
                 last_reviewed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(owner, question) DO UPDATE SET
                answer = excluded.answer,
                easiness_factor = excluded.easiness_factor,
                interval_days = excluded.interval_days,
                repetitions = excluded.repetitions,
                last_reviewed = excluded.last_reviewed",
        )?;
        for card in cards {
            stmt.execute(params![
                owner,
                card.question,
                card.answer,
                card.easiness_factor,
                card.interval_days,
                card.repetitions,
                card.last_reviewed
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Stores a whole deck, e.g. after an import. Existing cards are overwritten.
pub fn import_deck(deck: &Deck, conn: &mut Connection) -> Result<()> {
    new_deck(deck.owner, &deck.name, conn)?;
    save_cards(deck.owner, &deck.cards, conn)
}

/// Stores the learner's daily reminder time
pub fn set_reminder(owner: UserId, time: NaiveTime, conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT INTO reminders (owner, time) VALUES (?1, ?2)
         ON CONFLICT(owner) DO UPDATE SET time = excluded.time",
        params![owner, time.format("%H:%M").to_string()],
    )?;
    Ok(())
}

pub fn clear_reminder(owner: UserId, conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM reminders WHERE owner = ?1", params![owner])?;
    Ok(())
}

/// Loads every reminder time into a schedule
pub fn load_reminders(conn: &Connection) -> Result<ReminderSchedule> {
    let mut stmt = conn.prepare("SELECT owner, time FROM reminders")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, UserId>(0)?, row.get::<_, String>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut schedule = ReminderSchedule::new();
    for (owner, raw) in rows {
        schedule.set(owner, parse_reminder_time(&raw)?);
    }
    Ok(schedule)
}

/// [`DeckProvider`] backed by a single SQLite connection
#[derive(Clone)]
pub struct SqliteDeckStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDeckStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn open(path: &str) -> Result<Self> {
        Ok(Self::new(init_database(path)?))
    }

    /// Locks the connection for direct use of the functions in this module
    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ReviewError::Persistence("database connection poisoned".to_string()))
    }
}

#[async_trait]
impl DeckProvider for SqliteDeckStore {
    async fn load_deck(&self, user: UserId) -> Result<Deck> {
        let conn = self.connection()?;
        load_deck(user, &conn)
    }

    async fn save_cards(&self, user: UserId, cards: &[Card]) -> Result<()> {
        let mut conn = self.connection()?;
        save_cards(user, cards, &mut conn)
            .map_err(|e| ReviewError::Persistence(e.to_string()))
    }
}
