//! The token economy.
//!
//! A learner's balance is a [`Tokens`] value; the only ways to change it are
//! [`Tokens::debit`], [`Tokens::credit`] and [`Tokens::credit_if_improved`].

use serde::{Deserialize, Serialize};

/// Tokens granted when a learner registers.
pub const INITIAL_GRANT: i64 = 25;
/// Cost of creating a course (generated or copied by title).
pub const COURSE_CREATION_COST: i64 = 10;
/// Cost of enrolling into an existing course.
pub const ENROLLMENT_COST: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Insufficient token balance: {required} required, {available} available")]
pub struct InsufficientBalance {
    pub required: i64,
    pub available: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tokens(i64);

impl Tokens {
    /// Wraps a balance read back from storage.
    pub fn from_stored(balance: i64) -> Self {
        Tokens(balance)
    }

    pub fn balance(&self) -> i64 {
        self.0
    }

    /// Fails without touching the balance when it is below `amount`.
    pub fn ensure(&self, amount: i64) -> Result<(), InsufficientBalance> {
        if self.0 < amount {
            return Err(InsufficientBalance {
                required: amount,
                available: self.0,
            });
        }
        Ok(())
    }

    pub fn debit(&mut self, amount: i64) -> Result<(), InsufficientBalance> {
        self.ensure(amount)?;
        self.0 -= amount;
        Ok(())
    }

    pub fn credit(&mut self, amount: i64) {
        self.0 += amount;
    }

    /// Credits the improvement of `new_marks` over `previous_best`, if any,
    /// and returns the amount credited.
    pub fn credit_if_improved(&mut self, new_marks: i32, previous_best: i32) -> i64 {
        let gain = i64::from(new_marks) - i64::from(previous_best);
        if gain > 0 {
            self.credit(gain);
            gain
        } else {
            0
        }
    }
}
