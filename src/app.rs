//! Terminal front end.
//! Prints questions as a numbered multiple choice and feeds the learner's
//! keystrokes back to the engine as answer events.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use flashcards_review::error::ReviewError;
use flashcards_review::models::{OptionLabel, Question, UserId};
use flashcards_review::session::{
    AnswerEvent, AnswerOutcome, DeckProvider, PresentationSink, QuestionHandle, ReviewEngine,
    StartOutcome,
};
use log::warn;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

const FLUSH_RETRIES: usize = 3;

pub struct TerminalSink;

#[async_trait]
impl PresentationSink for TerminalSink {
    async fn show_question(
        &self,
        _user: UserId,
        question: &Question,
    ) -> flashcards_review::Result<QuestionHandle> {
        println!();
        if question.round > 1 {
            println!("Round {} (Review)", question.round);
        }
        println!(
            "[{}/{}] {}",
            question.position + 1,
            question.total,
            question.prompt
        );
        for (i, option) in question.options.iter().enumerate() {
            println!("  {}) {}", i + 1, option.text);
        }
        println!("  0) I don't remember    q) quit");
        Ok(QuestionHandle(format!("{}:{}", question.round, question.position)))
    }

    async fn show_message(&self, _user: UserId, text: &str) -> flashcards_review::Result<()> {
        println!("{}", text);
        Ok(())
    }
}

enum Input {
    Choice(OptionLabel, String),
    Quit,
    Invalid,
}

fn parse_input(line: &str, question: &Question) -> Input {
    match line.trim() {
        "q" | "quit" => Input::Quit,
        "0" => Input::Choice(OptionLabel::Blackout, String::new()),
        other => match other.parse::<usize>() {
            Ok(n) if (1..=question.options.len()).contains(&n) => {
                let option = &question.options[n - 1];
                Input::Choice(option.label, option.text.clone())
            }
            _ => Input::Invalid,
        },
    }
}

/// Runs the question/answer loop until the session finishes or the learner quits.
pub async fn run_session<D: DeckProvider>(
    engine: &ReviewEngine<D, TerminalSink>,
    user: UserId,
    outcome: StartOutcome,
) -> Result<()> {
    let mut current = match outcome {
        StartOutcome::NothingDue => return Ok(()),
        StartOutcome::Started(q) | StartOutcome::Resumed(q) => q,
    };
    let mut lines: Lines<BufReader<Stdin>> = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let Some(line) = lines.next_line().await? else {
            // stdin closed
            let saved = engine.abandon(user).await?;
            println!("Session closed, {} cards saved.", saved);
            return Ok(());
        };

        let (label, text) = match parse_input(&line, &current) {
            Input::Choice(label, text) => (label, text),
            Input::Quit => {
                let saved = engine.abandon(user).await?;
                println!("Stopped. {} cards saved.", saved);
                return Ok(());
            }
            Input::Invalid => {
                println!("Pick 1-{}, 0 or q.", current.options.len());
                continue;
            }
        };

        if label == OptionLabel::IncorrectAnswer {
            if let Some(correct) = current.correct_option() {
                println!("Wrong, it was: {}", correct.text);
            }
        }

        let event = AnswerEvent {
            user_id: user,
            session_id: current.session_id,
            position: current.position,
            label,
            text,
            at: Utc::now(),
        };

        match engine.answer(&event).await {
            Ok(AnswerOutcome::Next(q)) | Ok(AnswerOutcome::NextRound(q)) => current = q,
            Ok(AnswerOutcome::Finished { saved }) => {
                println!("{} cards updated.", saved);
                return Ok(());
            }
            Ok(AnswerOutcome::Ignored) => {}
            Err(ReviewError::Persistence(e)) => {
                warn!("Saving failed: {}", e);
                return retry_finish(engine, user).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn retry_finish<D: DeckProvider>(
    engine: &ReviewEngine<D, TerminalSink>,
    user: UserId,
) -> Result<()> {
    for attempt in 1..=FLUSH_RETRIES {
        tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
        match engine.retry_finish(user, Utc::now()).await {
            Ok(AnswerOutcome::NextRound(_)) => {
                println!("Progress saved. Run the review again to continue.");
                return Ok(());
            }
            Ok(_) => return Ok(()),
            Err(e) => warn!("Retry {} of {} failed: {}", attempt, FLUSH_RETRIES, e),
        }
    }
    anyhow::bail!("could not save the session after {} attempts", FLUSH_RETRIES)
}
