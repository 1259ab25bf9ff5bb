//! Review session state for one learner.
//! Walks a fixed queue of cards, builds the multiple-choice question for each one,
//! grades answers from latency and keeps the grade until it is applied with SM-2.
//!
//! The session never mutates the queued cards. Grades are recorded per position and
//! the updated cards are computed from the untouched originals, so computing them
//! twice (e.g. after a failed flush) gives the same result.

use super::quality::grade_answer;
use super::{Card, OptionLabel, Quality, UserId, sm2};
use crate::config::GradingConfig;
use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use rand::seq::index;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

pub const OPTIONS_PER_QUESTION: usize = 4;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Presenting,
    AwaitingAnswer,
    Grading,
    Finishing,
}

/// Due sessions loop over freshly due cards on finish, practice sessions don't.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionKind {
    Due,
    Practice,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub text: String,
    pub label: OptionLabel,
}

/// A question as shown to the learner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Session (and round) the question belongs to; answers must echo it back.
    pub session_id: u64,
    /// Queue position of the card; answers must echo it back.
    pub position: usize,
    pub round: u32,
    pub total: usize,
    pub prompt: String,
    pub options: Vec<AnswerOption>,
}

impl Question {
    pub fn correct_option(&self) -> Option<&AnswerOption> {
        self.options
            .iter()
            .find(|o| o.label == OptionLabel::CorrectAnswer)
    }
}

/// What the machine has to do after an answer was graded.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    PresentNext,
    Finish,
}

pub struct ReviewSession {
    id: u64,
    pub user: UserId,
    pub kind: SessionKind,
    pub today: NaiveDate,
    due_queue: Vec<Card>,
    grades: Vec<Option<Quality>>,
    position: usize,
    last_answer_at: DateTime<Utc>,
    pending_grade: Option<Quality>,
    state: SessionState,
    last_activity: DateTime<Utc>,
    round: u32,
    current: Option<Question>,
}

impl ReviewSession {
    /// Creates a session over `queue`. Returns `None` when there is nothing to review.
    pub fn new(
        user: UserId,
        kind: SessionKind,
        queue: Vec<Card>,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        if queue.is_empty() {
            return None;
        }

        let grades = vec![None; queue.len()];
        Some(Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            user,
            kind,
            today,
            due_queue: queue,
            grades,
            position: 0,
            last_answer_at: now,
            pending_grade: None,
            state: SessionState::Presenting,
            last_activity: now,
            round: 1,
            current: None,
        })
    }

    /// Session for the next pass over cards that are still due after a finish.
    /// It gets a fresh id, so presses left over from this pass can't grade it.
    pub fn next_round(&self, queue: Vec<Card>, now: DateTime<Utc>) -> Option<Self> {
        let mut next = Self::new(self.user, self.kind, queue, self.today, now)?;
        next.round = self.round + 1;
        Some(next)
    }

    /// Unique for every session and every round of it.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn len(&self) -> usize {
        self.due_queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.due_queue.is_empty()
    }

    pub fn pending_grade(&self) -> Option<Quality> {
        self.pending_grade
    }

    pub fn grades(&self) -> &[Option<Quality>] {
        &self.grades
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// The question currently on screen, if the session awaits an answer.
    pub fn current_question(&self) -> Option<&Question> {
        match self.state {
            SessionState::AwaitingAnswer => self.current.as_ref(),
            _ => None,
        }
    }

    /// Builds the question for the card at `position` and moves past it.
    /// Returns `None` unless the session is in the presenting state.
    pub fn present<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        placeholder: &str,
        now: DateTime<Utc>,
    ) -> Option<Question> {
        if self.state != SessionState::Presenting || self.position >= self.due_queue.len() {
            return None;
        }

        let card = &self.due_queue[self.position];
        let question = Question {
            session_id: self.id,
            position: self.position,
            round: self.round,
            total: self.due_queue.len(),
            prompt: card.question.clone(),
            options: build_options(&self.due_queue, self.position, rng, placeholder),
        };

        self.position += 1;
        self.state = SessionState::AwaitingAnswer;
        self.last_activity = now;
        self.current = Some(question.clone());
        Some(question)
    }

    /// Grades the answer to the question on screen and keeps it as the pending grade
    /// of the previously presented card (`position - 1`).
    ///
    /// Returns `None` for a stale or duplicate answer: one that names another
    /// session or position, is older than the previous answer, or arrives while
    /// no question is awaiting an answer.
    pub fn grade(
        &mut self,
        session_id: u64,
        answered_position: usize,
        label: OptionLabel,
        now: DateTime<Utc>,
        grading: &GradingConfig,
    ) -> Option<Quality> {
        if self.state != SessionState::AwaitingAnswer
            || session_id != self.id
            || answered_position.checked_add(1) != Some(self.position)
            || now < self.last_answer_at
        {
            return None;
        }

        let quality = grade_answer(label, now - self.last_answer_at, grading);
        self.pending_grade = Some(quality);
        self.last_answer_at = now;
        self.last_activity = now;
        self.state = SessionState::Grading;
        Some(quality)
    }

    /// Moves on after grading. The pending grade is applied to the previous card when
    /// another card follows; for the last card it stays pending until [`Self::settle`].
    pub fn advance(&mut self) -> Option<Step> {
        if self.state != SessionState::Grading {
            return None;
        }

        if self.position < self.due_queue.len() {
            self.settle();
            self.state = SessionState::Presenting;
            Some(Step::PresentNext)
        } else {
            self.state = SessionState::Finishing;
            Some(Step::Finish)
        }
    }

    /// Applies the pending grade, if any, to the previously presented card.
    pub fn settle(&mut self) {
        if let Some(quality) = self.pending_grade.take() {
            if let Some(slot) = self.position.checked_sub(1).and_then(|i| self.grades.get_mut(i)) {
                *slot = Some(quality);
            }
        }
    }

    /// Cards with a recorded grade, run through SM-2. Ungraded cards are left out.
    pub fn updated_cards(&self) -> Vec<Card> {
        self.due_queue
            .iter()
            .zip(self.grades.iter())
            .filter_map(|(card, grade)| grade.map(|q| sm2::assess_graded(card, q, self.today)))
            .collect()
    }
}

/// Four options for the card at `position`: its answer plus up to three decoys drawn
/// without replacement from the rest of the queue, padded with `placeholder`.
pub fn build_options<R: Rng + ?Sized>(
    queue: &[Card],
    position: usize,
    rng: &mut R,
    placeholder: &str,
) -> Vec<AnswerOption> {
    let correct = &queue[position].answer;

    // Skip answers equal to the correct one, the learner couldn't tell them apart
    let mut candidates: Vec<&str> = Vec::new();
    for (i, card) in queue.iter().enumerate() {
        if i != position && card.answer != *correct && !candidates.contains(&card.answer.as_str()) {
            candidates.push(&card.answer);
        }
    }

    let wanted = (OPTIONS_PER_QUESTION - 1).min(candidates.len());
    let mut options: Vec<AnswerOption> = index::sample(rng, candidates.len(), wanted)
        .into_iter()
        .map(|i| AnswerOption {
            text: candidates[i].to_string(),
            label: OptionLabel::IncorrectAnswer,
        })
        .collect();

    while options.len() < OPTIONS_PER_QUESTION - 1 {
        options.push(AnswerOption {
            text: placeholder.to_string(),
            label: OptionLabel::IncorrectAnswer,
        });
    }

    let slot = rng.gen_range(0..OPTIONS_PER_QUESTION);
    options.insert(
        slot,
        AnswerOption {
            text: correct.clone(),
            label: OptionLabel::CorrectAnswer,
        },
    );
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const PLACEHOLDER: &str = "The Road So Far";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap()
    }

    fn queue(n: usize) -> Vec<Card> {
        (0..n)
            .map(|i| Card::new(format!("word{}", i), format!("meaning{}", i)))
            .collect()
    }

    #[test]
    fn test_new_session_on_empty_queue() {
        assert!(ReviewSession::new(1, SessionKind::Due, Vec::new(), today(), start()).is_none());
    }

    #[test]
    fn test_options_have_exactly_one_correct() {
        let cards = queue(6);
        let mut rng = StdRng::seed_from_u64(7);

        for position in 0..cards.len() {
            let options = build_options(&cards, position, &mut rng, PLACEHOLDER);
            assert_eq!(options.len(), OPTIONS_PER_QUESTION);

            let correct: Vec<_> = options
                .iter()
                .filter(|o| o.label == OptionLabel::CorrectAnswer)
                .collect();
            assert_eq!(correct.len(), 1);
            assert_eq!(correct[0].text, cards[position].answer);

            let mut texts: Vec<_> = options.iter().map(|o| o.text.clone()).collect();
            texts.sort();
            texts.dedup();
            assert_eq!(texts.len(), OPTIONS_PER_QUESTION, "no repeated option text");
            assert!(!texts.contains(&PLACEHOLDER.to_string()));
        }
    }

    #[test]
    fn test_small_queue_is_padded_with_placeholder() {
        let cards = queue(2);
        let mut rng = StdRng::seed_from_u64(1);
        let options = build_options(&cards, 0, &mut rng, PLACEHOLDER);

        assert_eq!(options.len(), OPTIONS_PER_QUESTION);
        let placeholders: Vec<_> = options.iter().filter(|o| o.text == PLACEHOLDER).collect();
        assert_eq!(placeholders.len(), 2);
        assert!(
            placeholders
                .iter()
                .all(|o| o.label == OptionLabel::IncorrectAnswer)
        );
        assert!(options.iter().any(|o| o.text == "meaning1"));
    }

    #[test]
    fn test_decoys_skip_same_answer() {
        let cards = vec![
            Card::new("kot", "cat"),
            Card::new("kotek", "cat"),
            Card::new("pies", "dog"),
        ];
        let mut rng = StdRng::seed_from_u64(3);
        let options = build_options(&cards, 0, &mut rng, PLACEHOLDER);

        assert_eq!(options.iter().filter(|o| o.text == "cat").count(), 1);
        assert_eq!(options.iter().filter(|o| o.text == PLACEHOLDER).count(), 2);
    }

    #[test]
    fn test_lagged_grading_through_whole_queue() {
        let mut rng = StdRng::seed_from_u64(11);
        let grading = GradingConfig::default();
        let mut session =
            ReviewSession::new(9, SessionKind::Due, queue(5), today(), start()).unwrap();
        let mut now = start();

        let mut steps = Vec::new();
        loop {
            let question = session.present(&mut rng, PLACEHOLDER, now).unwrap();
            assert_eq!(session.state(), SessionState::AwaitingAnswer);
            assert_eq!(session.position(), question.position + 1);

            now += Duration::seconds(2);
            let quality = session
                .grade(session.id(), question.position, OptionLabel::CorrectAnswer, now, &grading)
                .unwrap();
            assert_eq!(quality.value(), 5);

            let step = session.advance().unwrap();
            steps.push(step);
            if steps.last() == Some(&Step::Finish) {
                break;
            }
            // The grade was applied to the card just answered
            assert_eq!(session.grades()[question.position], Some(quality));
            assert!(session.pending_grade().is_none());
        }

        assert_eq!(steps.len(), 5);
        assert_eq!(session.state(), SessionState::Finishing);
        // Cards 0..3 graded during the session, card 4 still pending
        assert!(
            session.grades()[..4]
                .iter()
                .all(|g| *g == Some(Quality::PERFECT))
        );
        assert_eq!(session.grades()[4], None);
        assert_eq!(session.pending_grade(), Some(Quality::PERFECT));

        session.settle();
        let updated = session.updated_cards();
        assert_eq!(updated.len(), 5);
        assert!(updated.iter().all(|c| c.repetitions == 1 && c.interval_days == 1));
    }

    #[test]
    fn test_latency_measured_from_previous_answer() {
        let mut rng = StdRng::seed_from_u64(5);
        let grading = GradingConfig::default();
        let mut session =
            ReviewSession::new(9, SessionKind::Due, queue(3), today(), start()).unwrap();

        let q0 = session.present(&mut rng, PLACEHOLDER, start()).unwrap();
        let t1 = start() + Duration::seconds(3);
        assert_eq!(
            session.grade(session.id(), q0.position, OptionLabel::CorrectAnswer, t1, &grading),
            Some(Quality::PERFECT)
        );
        session.advance();

        let q1 = session.present(&mut rng, PLACEHOLDER, t1).unwrap();
        // 7 seconds after the previous answer, not after session start
        let t2 = t1 + Duration::seconds(7);
        let quality = session
            .grade(session.id(), q1.position, OptionLabel::CorrectAnswer, t2, &grading)
            .unwrap();
        assert_eq!(quality.value(), 4);
    }

    #[test]
    fn test_duplicate_and_stale_answers_are_ignored() {
        let mut rng = StdRng::seed_from_u64(2);
        let grading = GradingConfig::default();
        let mut session =
            ReviewSession::new(9, SessionKind::Due, queue(3), today(), start()).unwrap();

        let id = session.id();
        let wrong = OptionLabel::IncorrectAnswer;

        // Nothing presented yet
        assert!(session.grade(id, 0, wrong, start(), &grading).is_none());

        let q0 = session.present(&mut rng, PLACEHOLDER, start()).unwrap();
        assert_eq!(q0.session_id, id);
        assert!(session.grade(id, 1, wrong, start(), &grading).is_none());
        assert!(session.grade(id, usize::MAX, wrong, start(), &grading).is_none());
        assert!(session.grade(id + 1, 0, wrong, start(), &grading).is_none());
        assert!(session.grade(id, 0, wrong, start(), &grading).is_some());
        // Same press delivered twice
        assert!(session.grade(id, 0, wrong, start(), &grading).is_none());
        assert_eq!(session.position(), 1);
    }

    #[test]
    fn test_answer_older_than_previous_is_ignored() {
        let mut rng = StdRng::seed_from_u64(8);
        let grading = GradingConfig::default();
        let mut session =
            ReviewSession::new(9, SessionKind::Due, queue(2), today(), start()).unwrap();

        let q0 = session.present(&mut rng, PLACEHOLDER, start()).unwrap();
        let late = session.grade(
            session.id(),
            q0.position,
            OptionLabel::CorrectAnswer,
            start() - Duration::seconds(1),
            &grading,
        );
        assert!(late.is_none());
        assert_eq!(session.state(), SessionState::AwaitingAnswer);
    }

    #[test]
    fn test_sessions_get_distinct_ids() {
        let first = ReviewSession::new(9, SessionKind::Due, queue(2), today(), start()).unwrap();
        let second = ReviewSession::new(9, SessionKind::Due, queue(2), today(), start()).unwrap();
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_present_requires_presenting_state() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut session =
            ReviewSession::new(9, SessionKind::Due, queue(2), today(), start()).unwrap();
        assert!(session.present(&mut rng, PLACEHOLDER, start()).is_some());
        assert!(session.present(&mut rng, PLACEHOLDER, start()).is_none());
        assert!(session.current_question().is_some());
    }

    #[test]
    fn test_updated_cards_is_repeatable() {
        let mut rng = StdRng::seed_from_u64(4);
        let grading = GradingConfig::default();
        let mut session =
            ReviewSession::new(9, SessionKind::Due, queue(2), today(), start()).unwrap();

        for _ in 0..2 {
            let q = session.present(&mut rng, PLACEHOLDER, start()).unwrap();
            let at = start() + Duration::seconds(8);
            session.grade(session.id(), q.position, OptionLabel::IncorrectAnswer, at, &grading);
            session.advance();
        }
        session.settle();
        session.settle();

        let first = session.updated_cards();
        let second = session.updated_cards();
        assert_eq!(first, second);
        assert!(first.iter().all(|c| c.repetitions == 0 && c.interval_days == 1));
    }

    #[test]
    fn test_next_round_bumps_round() {
        let session =
            ReviewSession::new(9, SessionKind::Due, queue(2), today(), start()).unwrap();
        let next = session.next_round(queue(1), start()).unwrap();
        assert_eq!(next.round(), 2);
        assert_ne!(next.id(), session.id());
        assert_eq!(next.position(), 0);
        assert!(session.next_round(Vec::new(), start()).is_none());
    }
}
