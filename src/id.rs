//! Primary-key sequences.
//!
//! [`IdGenerator`] hands out `start, start + jump, start + 2 * jump, ...` and can
//! optionally refuse to go past a limit. It is a standalone utility; rows in the
//! record store receive their ids from the store itself.
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("'jump' cannot be 0")]
    ZeroJump,

    #[error("next id {next} is over the limit {limit}")]
    OverLimit { next: i64, limit: i64 },

    #[error("next id {next} is under the limit {limit}")]
    UnderLimit { next: i64, limit: i64 },

    #[error("id sequence is exhausted")]
    Exhausted,
}

/// Produces primary keys. A single generator serves a single owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdGenerator {
    /// `None` once the sequence has overflowed `i64`.
    current: Option<i64>,
    jump: i64,
    limit: Option<i64>,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self {
            current: Some(1),
            jump: 1,
            limit: None,
        }
    }
}

impl IdGenerator {
    pub fn new(start: i64, jump: i64, limit: Option<i64>) -> Result<Self, IdError> {
        if jump == 0 {
            return Err(IdError::ZeroJump);
        }

        Ok(Self {
            current: Some(start),
            jump,
            limit,
        })
    }

    pub fn limit(&self) -> Option<i64> {
        self.limit
    }

    pub fn jump(&self) -> i64 {
        self.jump
    }

    /// Returns the current id and advances by `jump`.
    ///
    /// Once the bound is crossed the generator stays put, so every later call
    /// fails with the same error.
    pub fn next_id(&mut self) -> Result<i64, IdError> {
        let next = self.current.ok_or(IdError::Exhausted)?;

        if let Some(limit) = self.limit {
            if self.jump > 0 && next > limit {
                return Err(IdError::OverLimit { next, limit });
            }
            if self.jump < 0 && next < limit {
                return Err(IdError::UnderLimit { next, limit });
            }
        }

        self.current = next.checked_add(self.jump);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_jump_rejected() {
        assert_eq!(IdGenerator::new(1, 0, None), Err(IdError::ZeroJump));
        assert_eq!(IdGenerator::new(1, 0, Some(10)), Err(IdError::ZeroJump));
    }

    #[test]
    fn unlimited_sequence() {
        let mut ids = IdGenerator::new(5, 3, None).unwrap();
        let got: Vec<i64> = (0..5).map(|_| ids.next_id().unwrap()).collect();
        assert_eq!(got, vec![5, 8, 11, 14, 17]);
    }

    #[test]
    fn default_counts_from_one() {
        let mut ids = IdGenerator::default();
        assert_eq!(ids.next_id(), Ok(1));
        assert_eq!(ids.next_id(), Ok(2));
        assert_eq!(ids.jump(), 1);
        assert_eq!(ids.limit(), None);
    }

    #[test]
    fn positive_jump_stops_at_limit() {
        let mut ids = IdGenerator::new(1, 2, Some(5)).unwrap();
        assert_eq!(ids.next_id(), Ok(1));
        assert_eq!(ids.next_id(), Ok(3));
        assert_eq!(ids.next_id(), Ok(5));
        assert_eq!(ids.next_id(), Err(IdError::OverLimit { next: 7, limit: 5 }));
        // No valid id after the bound is crossed.
        assert_eq!(ids.next_id(), Err(IdError::OverLimit { next: 7, limit: 5 }));
    }

    #[test]
    fn negative_jump_stops_at_limit() {
        let mut ids = IdGenerator::new(3, -1, Some(2)).unwrap();
        assert_eq!(ids.next_id(), Ok(3));
        assert_eq!(ids.next_id(), Ok(2));
        assert_eq!(ids.next_id(), Err(IdError::UnderLimit { next: 1, limit: 2 }));
    }

    #[test]
    fn never_exceeds_limit() {
        for jump in [1, 2, 3, 7] {
            let mut ids = IdGenerator::new(0, jump, Some(20)).unwrap();
            while let Ok(id) = ids.next_id() {
                assert!(id <= 20);
            }
        }
    }

    #[test]
    fn overflow_exhausts() {
        let mut ids = IdGenerator::new(i64::MAX, 1, None).unwrap();
        assert_eq!(ids.next_id(), Ok(i64::MAX));
        assert_eq!(ids.next_id(), Err(IdError::Exhausted));
    }
}
