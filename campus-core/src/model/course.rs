use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// A capacity-bearing course. `enrolled_count` and `is_open` together form
/// the seat ledger; all mutation goes through the methods below so the
/// invariant `0 <= enrolled_count <= max_seats` and "closed when full"
/// holds at every step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub max_seats: i32,
    pub enrolled_count: i32,
    pub is_open: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    pub fn new(
        teacher_id: Uuid,
        name: String,
        description: Option<String>,
        price_cents: i64,
        max_seats: i32,
    ) -> Result<Self, CoreError> {
        if name.trim().is_empty() {
            return Err(CoreError::Validation("course name must not be empty".into()));
        }
        if price_cents < 0 {
            return Err(CoreError::Validation("price must not be negative".into()));
        }
        if max_seats < 1 {
            return Err(CoreError::Validation("max_seats must be at least 1".into()));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            teacher_id,
            name,
            description,
            price_cents,
            max_seats,
            enrolled_count: 0,
            is_open: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether a new enrollment would be accepted right now.
    pub fn can_enroll(&self) -> bool {
        self.is_open && self.enrolled_count < self.max_seats
    }

    /// Consume one seat if available; closes the course when the last seat
    /// goes. Returns false with no mutation when full or closed.
    pub fn reserve_seat(&mut self) -> bool {
        if !self.can_enroll() {
            return false;
        }
        self.enrolled_count += 1;
        if self.enrolled_count >= self.max_seats {
            self.is_open = false;
        }
        self.updated_at = Utc::now();
        true
    }

    /// Return one seat. A course closed because it filled up reopens; one
    /// closed manually below capacity stays closed. No-op at zero.
    pub fn release_seat(&mut self) {
        if self.enrolled_count == 0 {
            return;
        }
        let was_full = self.enrolled_count >= self.max_seats;
        self.enrolled_count -= 1;
        if was_full {
            self.is_open = true;
        }
        self.updated_at = Utc::now();
    }

    /// Manual availability toggle. Opening a full course is rejected so the
    /// "closed when full" invariant cannot be broken by an admin request.
    pub fn set_open(&mut self, open: bool) -> Result<(), CoreError> {
        if open && self.enrolled_count >= self.max_seats {
            return Err(CoreError::ReopenAtCapacity(self.id));
        }
        self.is_open = open;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Owner edits to the descriptive fields and capacity. Capacity can
    /// never shrink below the seats already sold.
    pub fn update_details(
        &mut self,
        name: String,
        description: Option<String>,
        price_cents: i64,
        max_seats: i32,
    ) -> Result<(), CoreError> {
        if name.trim().is_empty() {
            return Err(CoreError::Validation("course name must not be empty".into()));
        }
        if price_cents < 0 {
            return Err(CoreError::Validation("price must not be negative".into()));
        }
        if max_seats < 1 {
            return Err(CoreError::Validation("max_seats must be at least 1".into()));
        }
        if max_seats < self.enrolled_count {
            return Err(CoreError::Validation(format!(
                "max_seats {} is below the {} students already enrolled",
                max_seats, self.enrolled_count
            )));
        }
        self.name = name;
        self.description = description;
        self.price_cents = price_cents;
        self.max_seats = max_seats;
        // Raising capacity does not reopen a closed course; that stays an
        // explicit availability toggle.
        if self.enrolled_count >= self.max_seats {
            self.is_open = false;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(max_seats: i32) -> Course {
        Course::new(Uuid::new_v4(), "Rust 101".into(), None, 4900, max_seats).unwrap()
    }

    #[test]
    fn rejects_invalid_fields() {
        assert!(Course::new(Uuid::new_v4(), "  ".into(), None, 100, 5).is_err());
        assert!(Course::new(Uuid::new_v4(), "x".into(), None, -1, 5).is_err());
        assert!(Course::new(Uuid::new_v4(), "x".into(), None, 100, 0).is_err());
    }

    #[test]
    fn last_seat_closes_the_course() {
        let mut c = course(2);
        assert!(c.reserve_seat());
        assert!(c.is_open);
        assert!(c.reserve_seat());
        assert!(!c.is_open);
        assert_eq!(c.enrolled_count, 2);
        assert!(!c.reserve_seat());
        assert_eq!(c.enrolled_count, 2);
    }

    #[test]
    fn release_reopens_only_a_full_course() {
        let mut c = course(1);
        assert!(c.reserve_seat());
        assert!(!c.is_open);
        c.release_seat();
        assert!(c.is_open);
        assert_eq!(c.enrolled_count, 0);

        // Manually closed below capacity: releasing a seat keeps it closed.
        let mut c = course(3);
        assert!(c.reserve_seat());
        c.set_open(false).unwrap();
        c.release_seat();
        assert!(!c.is_open);
    }

    #[test]
    fn release_never_goes_negative() {
        let mut c = course(1);
        c.release_seat();
        assert_eq!(c.enrolled_count, 0);
    }

    #[test]
    fn manual_open_at_capacity_is_rejected() {
        let mut c = course(1);
        assert!(c.reserve_seat());
        let err = c.set_open(true).unwrap_err();
        assert!(matches!(err, CoreError::ReopenAtCapacity(_)));
        assert!(!c.is_open);
        // Closing is always allowed.
        c.set_open(false).unwrap();
    }

    #[test]
    fn capacity_cannot_shrink_below_enrollment() {
        let mut c = course(3);
        assert!(c.reserve_seat());
        assert!(c.reserve_seat());
        let err = c
            .update_details("Rust 101".into(), None, 4900, 1)
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        c.update_details("Rust 201".into(), None, 5900, 2).unwrap();
        assert_eq!(c.max_seats, 2);
        assert!(!c.is_open);
    }
}
