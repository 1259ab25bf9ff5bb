//! SM-2 (SuperMemo 2) spaced repetition algorithm implementation.
//!
//! The SM-2 algorithm calculates optimal review intervals based on recall quality:
//! - Each card has an easiness factor (EF) that adjusts based on performance
//! - Quality grades 0-2: Reset interval to one day and repetitions to zero (card needs relearning)
//! - Quality grades 3-5: Increase interval progressively (1 day → 6 days → EF multiplier)
//! - EF is adjusted after each review and has a minimum value of 1.3
//! - Higher quality responses lead to longer intervals between reviews
//!
//! Everything here is pure: the caller owns persisting the returned cards.

use super::flashcard::MIN_EASINESS_FACTOR;
use super::{Card, Deck, Quality};
use crate::error::Result;
use chrono::NaiveDate;

/// True if the card was never reviewed or its interval has elapsed by `today`.
pub fn is_due(card: &Card, today: NaiveDate) -> bool {
    match card.last_reviewed {
        None => true,
        // An interval so large that the date overflows is never due
        Some(_) => card.due_date().is_some_and(|due| today >= due),
    }
}

/// Cards of the deck that are due on `today`, in deck order.
pub fn select_due(deck: &Deck, today: NaiveDate) -> Vec<Card> {
    deck.cards
        .iter()
        .filter(|card| is_due(card, today))
        .cloned()
        .collect()
}

/// Calculates the card's next memory state according to the SM-2 algorithm.
/// quality: 0-5 (0 = complete blackout, 5 = perfect response)
pub fn assess(card: &Card, quality: u8, today: NaiveDate) -> Result<Card> {
    let quality = Quality::new(quality)?;
    Ok(assess_graded(card, quality, today))
}

/// Same as [`assess`] for an already validated grade.
pub fn assess_graded(card: &Card, quality: Quality, today: NaiveDate) -> Card {
    // Calculate new E-Factor (easiness factor)
    let penalty = (5 - quality.value()) as f64;
    let new_ef =
        (card.easiness_factor + (0.1 - penalty * (0.08 + penalty * 0.02))).max(MIN_EASINESS_FACTOR);

    let (new_interval, new_repetitions) = if !quality.is_pass() {
        // Lapse: relearn from tomorrow
        (1, 0)
    } else {
        let new_int = match card.repetitions {
            0 => 1,
            1 => 6,
            _ => (card.interval_days as f64 * new_ef).round() as u32,
        };
        (new_int, card.repetitions + 1)
    };

    Card {
        question: card.question.clone(),
        answer: card.answer.clone(),
        easiness_factor: new_ef,
        repetitions: new_repetitions,
        interval_days: new_interval,
        last_reviewed: Some(today),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReviewError;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn card(ef: f64, repetitions: u32, interval_days: u32) -> Card {
        Card {
            question: "dziękuję".to_string(),
            answer: "thank you".to_string(),
            easiness_factor: ef,
            repetitions,
            interval_days,
            last_reviewed: Some(day(1)),
        }
    }

    #[test]
    fn test_first_review() {
        let next = assess(&Card::new("cześć", "hello"), 5, day(1)).unwrap();
        assert_eq!(next.interval_days, 1);
        assert_eq!(next.repetitions, 1);
        assert!((next.easiness_factor - 2.6).abs() < 1e-9);
        assert_eq!(next.last_reviewed, Some(day(1)));
    }

    #[test]
    fn test_second_review() {
        let next = assess(&card(2.5, 1, 1), 4, day(2)).unwrap();
        assert_eq!(next.interval_days, 6);
        assert_eq!(next.repetitions, 2);
    }

    #[test]
    fn test_later_reviews_multiply_by_new_ef() {
        for quality in 3..=5u8 {
            let before = card(2.2, 4, 15);
            let next = assess(&before, quality, day(20)).unwrap();
            assert_eq!(
                next.interval_days,
                (15.0 * next.easiness_factor).round() as u32,
                "quality {}",
                quality
            );
            assert_eq!(next.repetitions, 5);
        }
    }

    #[test]
    fn test_quality_below_3_resets() {
        for quality in 0..3u8 {
            let next = assess(&card(2.5, 5, 40), quality, day(10)).unwrap();
            assert_eq!(next.interval_days, 1);
            assert_eq!(next.repetitions, 0);
            // EF should still be updated
            assert!(next.easiness_factor < 2.5);
        }
    }

    #[test]
    fn test_ef_floor() {
        let mut state = card(1.3, 1, 1);
        for quality in 0..=5u8 {
            state = assess(&state, quality, day(3)).unwrap();
            assert!(state.easiness_factor >= 1.3);
        }
        let next = assess(&card(1.35, 3, 10), 0, day(3)).unwrap();
        assert_eq!(next.easiness_factor, 1.3);
    }

    #[test]
    fn test_invalid_grade() {
        let err = assess(&card(2.5, 0, 0), 6, day(1)).unwrap_err();
        assert!(matches!(err, ReviewError::InvalidGrade(6)));
    }

    #[test]
    fn test_assess_is_referentially_transparent() {
        let before = card(2.36, 3, 11);
        let a = assess(&before, 4, day(12)).unwrap();
        let b = assess(&before, 4, day(12)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.easiness_factor.to_bits(), b.easiness_factor.to_bits());
    }

    #[test]
    fn test_three_review_scenario() {
        let fresh = Card::new("proszę", "please");

        let first = assess(&fresh, 5, day(1)).unwrap();
        assert!((first.easiness_factor - 2.6).abs() < 1e-9);
        assert_eq!((first.repetitions, first.interval_days), (1, 1));

        let second = assess(&first, 5, day(2)).unwrap();
        assert!((second.easiness_factor - 2.7).abs() < 1e-9);
        assert_eq!((second.repetitions, second.interval_days), (2, 6));

        let third = assess(&second, 2, day(8)).unwrap();
        assert_eq!((third.repetitions, third.interval_days), (0, 1));
        assert!(third.easiness_factor < second.easiness_factor);
        assert!((third.easiness_factor - 2.38).abs() < 1e-9);
    }

    #[test]
    fn test_is_due() {
        assert!(is_due(&Card::new("a", "b"), day(1)));

        let reviewed = card(2.5, 2, 6); // reviewed on day 1
        assert!(!is_due(&reviewed, day(6)));
        assert!(is_due(&reviewed, day(7)));
        assert!(is_due(&reviewed, day(20)));

        let zero_interval = card(2.5, 0, 0);
        assert!(is_due(&zero_interval, day(1)));
    }

    #[test]
    fn test_select_due_keeps_deck_order() {
        let mut deck = Deck::new(7, "Polish Vocabulary");
        let mut later = card(2.5, 2, 6);
        later.question = "later".to_string();
        let mut yesterday = card(2.5, 1, 1);
        yesterday.question = "yesterday".to_string();

        deck.add_card(Card::new("fresh", "new")).unwrap();
        deck.add_card(later).unwrap();
        deck.add_card(yesterday).unwrap();

        let due: Vec<_> = select_due(&deck, day(2))
            .into_iter()
            .map(|c| c.question)
            .collect();
        assert_eq!(due, vec!["fresh", "yesterday"]);
    }
}
