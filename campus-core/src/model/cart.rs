use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A student's pending selection. One cart per student, created lazily on
/// first access and kept for the life of the student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: Uuid,
    pub student_id: Uuid,
    pub lines: Vec<CartLine>,
    /// Cached sum of line prices; recomputed and persisted on every
    /// mutation, never trusted across one.
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One course in a cart. Name and price are the course's current values
/// joined in at read time; nothing is frozen until the order is placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub id: Uuid,
    pub course_id: Uuid,
    pub course_name: String,
    pub price_cents: i64,
    pub added_at: DateTime<Utc>,
}

impl Cart {
    pub fn empty(student_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            student_id,
            lines: Vec::new(),
            total_cents: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn contains_course(&self, course_id: Uuid) -> bool {
        self.lines.iter().any(|l| l.course_id == course_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn recomputed_total(&self) -> i64 {
        self.lines.iter().map(|l| l.price_cents).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(course_id: Uuid, price_cents: i64) -> CartLine {
        CartLine {
            id: Uuid::new_v4(),
            course_id,
            course_name: "Course".into(),
            price_cents,
            added_at: Utc::now(),
        }
    }

    #[test]
    fn total_is_sum_of_line_prices() {
        let mut cart = Cart::empty(Uuid::new_v4());
        assert_eq!(cart.recomputed_total(), 0);
        cart.lines.push(line(Uuid::new_v4(), 1000));
        cart.lines.push(line(Uuid::new_v4(), 2000));
        assert_eq!(cart.recomputed_total(), 3000);
    }

    #[test]
    fn contains_course_matches_by_id() {
        let course_id = Uuid::new_v4();
        let mut cart = Cart::empty(Uuid::new_v4());
        assert!(!cart.contains_course(course_id));
        cart.lines.push(line(course_id, 500));
        assert!(cart.contains_course(course_id));
    }
}
