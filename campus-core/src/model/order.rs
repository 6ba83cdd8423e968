use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::code::generate_order_code;
use crate::model::Course;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Transition predicate for the order lifecycle. Placement completes an
    /// order directly; the post-completion transitions belong to a billing
    /// or refund collaborator, not to this engine.
    pub fn can_transition(self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Pending, Completed) | (Completed, Cancelled) | (Completed, Refunded)
        )
    }
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "COMPLETED" => Some(OrderStatus::Completed),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            "REFUNDED" => Some(OrderStatus::Refunded),
            _ => None,
        }
    }
}

/// An immutable record of a completed purchase. Lines are fixed at
/// creation; only `status` may move afterwards, and never through this
/// crate's operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_code: String,
    pub student_id: Uuid,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
}

/// The course purchased and the price paid at purchase time. A historical
/// fact: later price or name changes on the course do not touch it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub course_id: Uuid,
    pub course_name: String,
    pub price_cents: i64,
}

impl Order {
    /// Build a completed order from the courses being purchased, freezing
    /// each course's current name and price into its line.
    pub fn from_courses(student_id: Uuid, courses: &[Course]) -> Self {
        let order_id = Uuid::new_v4();
        let lines: Vec<OrderLine> = courses
            .iter()
            .map(|c| OrderLine {
                id: Uuid::new_v4(),
                order_id,
                course_id: c.id,
                course_name: c.name.clone(),
                price_cents: c.price_cents,
            })
            .collect();
        let total_cents = lines.iter().map(|l| l.price_cents).sum();
        Self {
            id: order_id,
            order_code: generate_order_code(),
            student_id,
            status: OrderStatus::Completed,
            total_cents,
            lines,
            created_at: Utc::now(),
        }
    }

    /// Swap in a fresh code after a collision; everything else stays.
    pub fn regenerate_code(&mut self) {
        self.order_code = generate_order_code();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(price_cents: i64) -> Course {
        Course::new(Uuid::new_v4(), "Course".into(), None, price_cents, 10).unwrap()
    }

    #[test]
    fn order_freezes_prices_and_sums_total() {
        let courses = vec![course(1000), course(2000)];
        let order = Order::from_courses(Uuid::new_v4(), &courses);
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.total_cents, 3000);
        assert_eq!(order.lines.len(), 2);
        assert!(order.lines.iter().all(|l| l.order_id == order.id));
    }

    #[test]
    fn regenerate_changes_only_the_code() {
        let mut order = Order::from_courses(Uuid::new_v4(), &[course(500)]);
        let old_code = order.order_code.clone();
        let old_id = order.id;
        order.regenerate_code();
        assert_ne!(order.order_code, old_code);
        assert_eq!(order.id, old_id);
    }

    #[test]
    fn lifecycle_transitions() {
        use OrderStatus::*;
        assert!(Pending.can_transition(Completed));
        assert!(Completed.can_transition(Cancelled));
        assert!(Completed.can_transition(Refunded));
        assert!(!Completed.can_transition(Pending));
        assert!(!Cancelled.can_transition(Completed));
        assert!(!Refunded.can_transition(Cancelled));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("PAID"), None);
    }
}
