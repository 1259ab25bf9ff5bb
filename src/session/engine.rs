//! Review engine: drives each learner's session against the deck provider
//! and the presentation sink.
//!
//! Every public operation locks the learner's slot in the [`SessionStore`] for its
//! whole duration, collaborator calls included.

use super::ports::{AnswerEvent, AnswerOutcome, DeckProvider, PresentationSink, StartOutcome};
use super::store::{SessionGuard, SessionStore};
use crate::config::Config;
use crate::error::{Result, ReviewError};
use crate::models::review_session::Step;
use crate::models::{Card, Question, ReviewSession, SessionKind, SessionState, UserId, sm2};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error, info, warn};
use rand::seq::SliceRandom;
use std::sync::Arc;

pub const NOTHING_DUE_MESSAGE: &str = "Nothing for repetition today! Try a practice round.";
pub const EMPTY_DECK_MESSAGE: &str = "Your deck is empty. Add some cards first.";
pub const FINISHED_MESSAGE: &str = "Finished!";

pub struct ReviewEngine<D, P> {
    decks: Arc<D>,
    sink: Arc<P>,
    sessions: SessionStore,
    config: Config,
}

impl<D: DeckProvider, P: PresentationSink> ReviewEngine<D, P> {
    pub fn new(decks: Arc<D>, sink: Arc<P>, config: Config) -> Self {
        Self {
            decks,
            sink,
            sessions: SessionStore::new(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.active_count()
    }

    /// Users that still hold a slot in the session store, live session or not.
    pub fn tracked_users(&self) -> usize {
        self.sessions.len()
    }

    /// Starts a review of the learner's due cards, or shows the current question
    /// again if a session is already running.
    pub async fn start(
        &self,
        user: UserId,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<StartOutcome> {
        let mut slot = self.sessions.lock(user).await;
        if let Some(outcome) = self.resume_locked(&mut slot, now).await? {
            return Ok(outcome);
        }

        let deck = self.decks.load_deck(user).await?;
        let due = sm2::select_due(&deck, today);
        debug!(
            "User {} has {} of {} cards due on {}",
            user,
            due.len(),
            deck.len(),
            today
        );

        let Some(session) = ReviewSession::new(user, SessionKind::Due, due, today, now) else {
            info!("Nothing due for user {}", user);
            self.sink.show_message(user, NOTHING_DUE_MESSAGE).await?;
            drop(slot);
            self.sessions.prune();
            return Ok(StartOutcome::NothingDue);
        };

        info!("Starting review for user {} with {} cards", user, session.len());
        let session = slot.insert(session);
        let question = self.present(session, now).await?;
        Ok(StartOutcome::Started(question))
    }

    /// Entry point for the host's reminder clock.
    pub async fn on_reminder(
        &self,
        user: UserId,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<StartOutcome> {
        info!("Reminder fired for user {}", user);
        self.start(user, today, now).await
    }

    /// Starts a practice round over up to `count` random cards, due or not.
    /// A `count` of zero practices a single card.
    pub async fn start_practice(
        &self,
        user: UserId,
        today: NaiveDate,
        now: DateTime<Utc>,
        count: usize,
    ) -> Result<StartOutcome> {
        let mut slot = self.sessions.lock(user).await;
        if let Some(outcome) = self.resume_locked(&mut slot, now).await? {
            return Ok(outcome);
        }

        let deck = self.decks.load_deck(user).await?;
        let sample: Vec<_> = {
            let mut rng = rand::thread_rng();
            deck.cards
                .choose_multiple(&mut rng, count.max(1))
                .cloned()
                .collect()
        };

        let Some(session) = ReviewSession::new(user, SessionKind::Practice, sample, today, now)
        else {
            self.sink.show_message(user, EMPTY_DECK_MESSAGE).await?;
            drop(slot);
            self.sessions.prune();
            return Ok(StartOutcome::NothingDue);
        };

        info!("Starting practice for user {} with {} cards", user, session.len());
        let session = slot.insert(session);
        let question = self.present(session, now).await?;
        Ok(StartOutcome::Started(question))
    }

    /// Handles a button press. Duplicates and answers without a session are ignored.
    pub async fn answer(&self, event: &AnswerEvent) -> Result<AnswerOutcome> {
        let mut slot = self.sessions.lock(event.user_id).await;
        let Some(session) = slot.as_mut() else {
            debug!("No session for user {}, ignoring answer", event.user_id);
            return Ok(AnswerOutcome::Ignored);
        };

        let Some(quality) = session.grade(
            event.session_id,
            event.position,
            event.label,
            event.at,
            &self.config.grading,
        ) else {
            debug!(
                "Ignoring stale answer from user {} for session {} position {} (at {} {})",
                event.user_id,
                event.session_id,
                event.position,
                session.id(),
                session.position()
            );
            return Ok(AnswerOutcome::Ignored);
        };
        debug!(
            "User {} answered position {} with {:?}, quality {}",
            event.user_id,
            event.position,
            event.label,
            quality.value()
        );

        match session.advance() {
            Some(Step::PresentNext) => {
                let question = self.present(session, event.at).await?;
                Ok(AnswerOutcome::Next(question))
            }
            Some(Step::Finish) => {
                let outcome = self.finish_locked(&mut slot, event.at).await;
                drop(slot);
                self.sessions.prune();
                outcome
            }
            None => Ok(AnswerOutcome::Ignored),
        }
    }

    /// Re-runs a finish whose flush failed. Safe to call any number of times.
    pub async fn retry_finish(&self, user: UserId, now: DateTime<Utc>) -> Result<AnswerOutcome> {
        let mut slot = self.sessions.lock(user).await;
        let outcome = match slot.as_ref().map(|s| s.state()) {
            Some(SessionState::Finishing) => self.finish_locked(&mut slot, now).await,
            _ => Ok(AnswerOutcome::Ignored),
        };
        drop(slot);
        self.sessions.prune();
        outcome
    }

    /// Gives up on the learner's session, saving the cards graded so far.
    /// Returns how many cards were saved.
    pub async fn abandon(&self, user: UserId) -> Result<usize> {
        let mut slot = self.sessions.lock(user).await;
        let saved = self.flush_and_drop(&mut slot).await;
        drop(slot);
        self.sessions.prune();
        saved
    }

    /// Abandons every session idle for longer than the configured TTL.
    /// Sessions that fail to flush are kept for the next sweep.
    pub async fn evict_idle(&self, now: DateTime<Utc>) -> Vec<UserId> {
        let Some(cutoff) = now.checked_sub_signed(self.config.session_ttl) else {
            debug!("Session TTL reaches before the earliest date, nothing is idle");
            return Vec::new();
        };
        let mut evicted = Vec::new();

        for user in self.sessions.idle_users(cutoff) {
            let mut slot = self.sessions.lock(user).await;
            // Activity may have happened while we were waiting for the lock
            let still_idle = slot
                .as_ref()
                .is_some_and(|session| session.last_activity() < cutoff);
            if !still_idle {
                continue;
            }

            match self.flush_and_drop(&mut slot).await {
                Ok(saved) => {
                    info!("Evicted idle session of user {} ({} cards saved)", user, saved);
                    evicted.push(user);
                }
                Err(e) => warn!("Failed to evict idle session of user {}: {}", user, e),
            }
        }

        self.sessions.prune();
        evicted
    }

    /// Shows the running session's question again, finishing it first if a
    /// previous flush failed. `None` means there is no session to resume.
    async fn resume_locked(
        &self,
        slot: &mut SessionGuard,
        now: DateTime<Utc>,
    ) -> Result<Option<StartOutcome>> {
        let Some(session) = slot.as_ref() else {
            return Ok(None);
        };

        if session.state() == SessionState::Finishing {
            return match self.finish_locked(slot, now).await? {
                AnswerOutcome::NextRound(question) => Ok(Some(StartOutcome::Resumed(question))),
                _ => Ok(None),
            };
        }

        match session.current_question().cloned() {
            Some(question) => {
                debug!("Resuming session of user {} at {}", session.user, question.position);
                self.sink.show_question(session.user, &question).await?;
                Ok(Some(StartOutcome::Resumed(question)))
            }
            None => Ok(None),
        }
    }

    async fn present(&self, session: &mut ReviewSession, now: DateTime<Utc>) -> Result<Question> {
        let question = {
            let mut rng = rand::thread_rng();
            session.present(&mut rng, &self.config.placeholder_decoy, now)
        };
        let question = question.ok_or_else(|| {
            ReviewError::Presentation(format!("no card left to present to user {}", session.user))
        })?;

        self.sink.show_question(session.user, &question).await?;
        Ok(question)
    }

    /// Applies the last grade, flushes the reviewed cards once and either starts a
    /// new round over cards that are still due or tears the session down.
    ///
    /// On a failed flush the session stays in the finishing state untouched.
    async fn finish_locked(
        &self,
        slot: &mut SessionGuard,
        now: DateTime<Utc>,
    ) -> Result<AnswerOutcome> {
        let Some(session) = slot.as_mut() else {
            return Ok(AnswerOutcome::Ignored);
        };
        let user = session.user;

        session.settle();
        let updated = session.updated_cards();
        self.save(user, &updated).await?;
        info!(
            "Saved {} reviewed cards for user {} (round {})",
            updated.len(),
            user,
            session.round()
        );

        if session.kind == SessionKind::Due {
            let mut deck = self.decks.load_deck(user).await?;
            deck.merge(&updated);
            let still_due = sm2::select_due(&deck, session.today);

            if let Some(next) = session.next_round(still_due, now) {
                info!(
                    "Starting round {} for user {} with {} cards",
                    next.round(),
                    user,
                    next.len()
                );
                let session = slot.insert(next);
                let question = self.present(session, now).await?;
                return Ok(AnswerOutcome::NextRound(question));
            }
        }

        **slot = None;
        if let Err(e) = self.sink.show_message(user, FINISHED_MESSAGE).await {
            warn!("Failed to tell user {} the session finished: {}", user, e);
        }
        Ok(AnswerOutcome::Finished {
            saved: updated.len(),
        })
    }

    async fn flush_and_drop(&self, slot: &mut SessionGuard) -> Result<usize> {
        let Some(session) = slot.as_mut() else {
            return Ok(0);
        };
        let user = session.user;

        session.settle();
        let updated = session.updated_cards();
        if !updated.is_empty() {
            self.save(user, &updated).await?;
        }

        info!(
            "Dropped session of user {} at {}/{} ({} cards saved)",
            user,
            session.position(),
            session.len(),
            updated.len()
        );
        **slot = None;
        Ok(updated.len())
    }

    async fn save(&self, user: UserId, cards: &[Card]) -> Result<()> {
        self.decks.save_cards(user, cards).await.map_err(|e| {
            error!("Failed to save {} cards for user {}: {}", cards.len(), user, e);
            match e {
                ReviewError::Persistence(_) => e,
                other => ReviewError::Persistence(other.to_string()),
            }
        })
    }
}
