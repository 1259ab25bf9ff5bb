mod app;

use anyhow::{Context, Result};
use app::{TerminalSink, run_session};
use chrono::{Local, NaiveDate, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use flashcards_review::config::Config;
use flashcards_review::database::{SqliteDeckStore, db};
use flashcards_review::export::json::{export_json_to_path, import_json};
use flashcards_review::models::Card;
use flashcards_review::models::reminder::parse_reminder_time;
use flashcards_review::session::{DeckProvider, ReviewEngine};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "flashcards", about = "Vocabulary review with spaced repetition")]
struct Cli {
    /// SQLite database path, overrides FLASHCARDS_DB_PATH
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Review the cards that are due
    Review {
        #[arg(long)]
        user: i64,
        /// Review as of this day (YYYY-MM-DD) instead of today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Practice random cards, due or not
    Practice {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        count: Option<usize>,
    },
    /// Add a card to a deck
    Add {
        #[arg(long)]
        user: i64,
        question: String,
        answer: String,
    },
    /// Import a deck from a JSON file
    Import {
        file: PathBuf,
        /// Store under this user instead of the owner in the file
        #[arg(long)]
        user: Option<i64>,
    },
    /// Export a deck to a JSON file
    Export {
        #[arg(long)]
        user: i64,
        file: PathBuf,
    },
    /// Set (HH:MM) or clear the daily reminder
    Remind {
        #[arg(long)]
        user: i64,
        time: Option<String>,
        #[arg(long, conflicts_with = "time")]
        clear: bool,
    },
    /// Wait for the user's reminder time, then start a review
    Watch {
        #[arg(long)]
        user: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    let store = Arc::new(
        SqliteDeckStore::open(&config.db_path)
            .with_context(|| format!("Failed to open database {}", config.db_path))?,
    );

    match cli.command {
        Command::Review { user, date } => {
            seed_if_empty(&store, user).await?;
            let today = date.unwrap_or_else(|| Local::now().date_naive());
            let engine = ReviewEngine::new(Arc::clone(&store), Arc::new(TerminalSink), config);
            let outcome = engine.start(user, today, Utc::now()).await?;
            run_session(&engine, user, outcome).await?;
        }
        Command::Practice { user, count } => {
            seed_if_empty(&store, user).await?;
            let count = count.unwrap_or(config.practice_size);
            let engine = ReviewEngine::new(Arc::clone(&store), Arc::new(TerminalSink), config);
            let outcome = engine
                .start_practice(user, Local::now().date_naive(), Utc::now(), count)
                .await?;
            run_session(&engine, user, outcome).await?;
        }
        Command::Add {
            user,
            question,
            answer,
        } => {
            let conn = store.connection()?;
            db::add_card(user, &Card::new(question.as_str(), answer.as_str()), &conn)?;
            println!("Card '{}' added.", question);
        }
        Command::Import { file, user } => {
            let mut deck = import_json(&file)?;
            if let Some(user) = user {
                deck.owner = user;
            }
            let mut conn = store.connection()?;
            db::import_deck(&deck, &mut conn)?;
            println!(
                "Deck '{}' imported successfully with {} cards!",
                deck.name,
                deck.len()
            );
        }
        Command::Export { user, file } => {
            let deck = store.load_deck(user).await?;
            export_json_to_path(&deck, &file)?;
            println!("Deck '{}' exported successfully!", deck.name);
        }
        Command::Remind { user, time, clear } => {
            let conn = store.connection()?;
            match time {
                Some(raw) if !clear => {
                    let time = parse_reminder_time(&raw)?;
                    db::set_reminder(user, time, &conn)?;
                    println!("Reminder set for {}.", time.format("%H:%M"));
                }
                _ => {
                    db::clear_reminder(user, &conn)?;
                    println!("Reminder cleared.");
                }
            }
        }
        Command::Watch { user } => {
            let engine = ReviewEngine::new(Arc::clone(&store), Arc::new(TerminalSink), config);
            watch(&engine, &store, user).await?;
        }
    }

    Ok(())
}

/// Ticks once a minute and starts a review when the user's reminder time passes.
async fn watch(
    engine: &ReviewEngine<SqliteDeckStore, TerminalSink>,
    store: &SqliteDeckStore,
    user: i64,
) -> Result<()> {
    let schedule = {
        let conn = store.connection()?;
        db::load_reminders(&conn)?
    };
    let Some(time) = schedule.get(user) else {
        anyhow::bail!("No reminder set for user {}, use `remind` first", user);
    };
    println!("Waiting for {} ...", time.format("%H:%M"));

    let mut last_tick: NaiveDateTime = Local::now().naive_local();
    let mut ticker = tokio::time::interval(Duration::from_secs(60));
    loop {
        ticker.tick().await;
        let now = Local::now().naive_local();

        let evicted = engine.evict_idle(Utc::now()).await;
        if !evicted.is_empty() {
            info!("Evicted {} idle sessions", evicted.len());
        }

        if schedule.due_between(last_tick, now).contains(&user) {
            let outcome = engine.on_reminder(user, now.date(), Utc::now()).await?;
            run_session(engine, user, outcome).await?;
            println!("Waiting for {} ...", time.format("%H:%M"));
        }
        last_tick = now;
    }
}

/// First run: give the learner something to review.
async fn seed_if_empty(store: &SqliteDeckStore, user: i64) -> Result<()> {
    if !store.load_deck(user).await?.is_empty() {
        return Ok(());
    }

    let conn = store.connection()?;
    db::new_deck(user, "Polish Vocabulary", &conn)?;
    for (question, answer) in [
        ("cześć", "hello"),
        ("dziękuję", "thank you"),
        ("proszę", "please"),
        ("do widzenia", "goodbye"),
        ("tak", "yes"),
    ] {
        db::add_card(user, &Card::new(question, answer), &conn)?;
    }
    println!("Sample data created!");
    Ok(())
}
