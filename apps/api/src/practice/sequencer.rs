//! Question sequencing: owns the cursor into a fixed deck.
//!
//! The cursor ranges over `0..=len`. `len` is the exhausted position and is
//! only reachable through `advance()`.

use crate::errors::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved to the next question.
    Moved,
    /// Stepped past the last question. Emitted exactly once.
    Exhausted,
    /// Already past the end; nothing changed.
    AlreadyExhausted,
}

#[derive(Debug, Clone)]
pub struct QuestionSequencer {
    index: usize,
    len: usize,
}

impl QuestionSequencer {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_exhausted(&self) -> bool {
        self.index == self.len
    }

    /// Index of the current question, or `None` once the deck is exhausted.
    pub fn current(&self) -> Option<usize> {
        (self.index < self.len).then_some(self.index)
    }

    pub fn advance(&mut self) -> Advance {
        if self.is_exhausted() {
            return Advance::AlreadyExhausted;
        }
        self.index += 1;
        if self.is_exhausted() {
            Advance::Exhausted
        } else {
            Advance::Moved
        }
    }

    /// Steps back one question. Returns false when already at the first question.
    pub fn retreat(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        true
    }

    pub fn jump_to(&mut self, index: usize) -> Result<(), SessionError> {
        if index >= self.len {
            return Err(SessionError::OutOfRange {
                index,
                len: self.len,
            });
        }
        self.index = index;
        Ok(())
    }
}
