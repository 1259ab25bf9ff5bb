//! Deck is a set of cards owned by one learner, with unique questions
use super::Card;
use crate::error::{Result, ReviewError};
use serde::{Deserialize, Serialize};

pub type UserId = i64;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Deck {
    pub owner: UserId,
    pub name: String,
    pub cards: Vec<Card>,
}

impl Deck {
    pub fn new(owner: UserId, name: impl Into<String>) -> Self {
        Self {
            owner,
            name: name.into(),
            cards: Vec::new(),
        }
    }

    pub fn get(&self, question: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.question == question)
    }

    /// Appends a card, rejecting a question that is already in the deck.
    pub fn add_card(&mut self, card: Card) -> Result<()> {
        if self.get(&card.question).is_some() {
            return Err(ReviewError::DuplicateQuestion(card.question));
        }
        self.cards.push(card);
        Ok(())
    }

    /// Replaces cards that share a question with one of `updated`.
    /// Cards unknown to the deck are ignored. Returns how many were replaced.
    pub fn merge(&mut self, updated: &[Card]) -> usize {
        let mut replaced = 0;
        for card in updated {
            if let Some(slot) = self.cards.iter_mut().find(|c| c.question == card.question) {
                *slot = card.clone();
                replaced += 1;
            }
        }
        replaced
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}
