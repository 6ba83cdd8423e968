use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Broadcast after a committed placement changes a course's seat count.
/// Advisory only; the ledger row is the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseAvailabilityEvent {
    pub course_id: Uuid,
    pub enrolled_count: i32,
    pub max_seats: i32,
    pub is_open: bool,
    pub occurred_at: i64,
}

/// Emitted once per successfully fulfilled order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedEvent {
    pub order_id: Uuid,
    pub order_code: String,
    pub student_id: Uuid,
    pub total_cents: i64,
    pub line_count: i32,
    pub occurred_at: i64,
}
