use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{Cart, Course, Order, Student};
use crate::CoreResult;

/// Course catalog plus the seat-capacity ledger. The three ledger
/// operations are the only way capacity is consumed or returned, and each
/// implementation must make them atomic: a single conditional UPDATE in
/// Postgres, a single critical section in memory. A read-then-write pair
/// here is an overselling bug.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn insert_course(&self, course: &Course) -> CoreResult<()>;

    /// Persist owner edits to the descriptive fields and capacity; the
    /// capacity floor (never below `enrolled_count`) is re-checked under
    /// the same isolation as the ledger operations.
    async fn update_course_details(
        &self,
        id: Uuid,
        name: String,
        description: Option<String>,
        price_cents: i64,
        max_seats: i32,
    ) -> CoreResult<Course>;

    async fn get_course(&self, id: Uuid) -> CoreResult<Option<Course>>;
    async fn list_courses(&self) -> CoreResult<Vec<Course>>;
    async fn list_available_courses(&self) -> CoreResult<Vec<Course>>;
    async fn list_courses_by_teacher(&self, teacher_id: Uuid) -> CoreResult<Vec<Course>>;
    async fn count_courses(&self) -> CoreResult<i64>;

    /// Atomically take one seat if the course is open with capacity left,
    /// closing it when the last seat goes. Ok(false) means no mutation.
    /// A missing course is `CourseNotFound`, not a silent false.
    async fn try_reserve_seat(&self, course_id: Uuid) -> CoreResult<bool>;

    /// Compensating inverse of `try_reserve_seat`. No-op at zero seats; a
    /// course that was closed because it filled reopens.
    async fn release_seat(&self, course_id: Uuid) -> CoreResult<()>;

    /// Manual availability toggle; opening at/above capacity is rejected
    /// with `ReopenAtCapacity`.
    async fn set_open(&self, course_id: Uuid, open: bool) -> CoreResult<Course>;

    /// Advisory availability check for catalog display and cart adds.
    /// Holds nothing; commit-time re-validation is still mandatory.
    async fn peek_available(&self, course_id: Uuid) -> CoreResult<bool>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn get_cart(&self, student_id: Uuid) -> CoreResult<Option<Cart>>;

    /// Lazy idempotent creation: returns the existing cart or a fresh empty
    /// one for the student.
    async fn get_or_create_cart(&self, student_id: Uuid) -> CoreResult<Cart>;

    /// Add a line; a second line for the same course is
    /// `CourseAlreadyInCart` (unique per (cart, course)).
    async fn insert_line(&self, cart_id: Uuid, course_id: Uuid) -> CoreResult<()>;

    /// Remove a line, reporting whether it existed.
    async fn delete_line(&self, cart_id: Uuid, course_id: Uuid) -> CoreResult<bool>;

    async fn clear_lines(&self, cart_id: Uuid) -> CoreResult<()>;

    /// Recompute the cached total from current course prices and persist
    /// it, returning the new value.
    async fn recompute_total(&self, cart_id: Uuid) -> CoreResult<i64>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist an order with its lines. A code collision surfaces as
    /// `DuplicateOrderCode` so the caller can regenerate and retry.
    async fn insert_order(&self, order: &Order) -> CoreResult<()>;

    /// Compensation hook: remove an order whose follow-up steps failed.
    /// Not reachable from any API operation.
    async fn delete_order(&self, order_id: Uuid) -> CoreResult<()>;

    async fn get_order_by_code(&self, code: &str) -> CoreResult<Option<Order>>;
    async fn list_orders_for_student(&self, student_id: Uuid) -> CoreResult<Vec<Order>>;
}

/// The (student, course) ownership facts. Written only by a completed
/// fulfillment; removal exists solely as that transaction's compensation.
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    async fn is_enrolled(&self, student_id: Uuid, course_id: Uuid) -> CoreResult<bool>;

    /// At most one row per (student, course); a duplicate is
    /// `AlreadyEnrolled`.
    async fn add_enrollment(&self, student_id: Uuid, course_id: Uuid) -> CoreResult<()>;

    async fn remove_enrollment(&self, student_id: Uuid, course_id: Uuid) -> CoreResult<()>;

    async fn list_enrolled_courses(&self, student_id: Uuid) -> CoreResult<Vec<Course>>;
}

#[async_trait]
pub trait StudentRepository: Send + Sync {
    /// A duplicate email is `DuplicateEmail`.
    async fn insert_student(&self, student: &Student) -> CoreResult<()>;

    async fn get_student(&self, id: Uuid) -> CoreResult<Option<Student>>;
    async fn list_students(&self) -> CoreResult<Vec<Student>>;
    async fn student_exists(&self, id: Uuid) -> CoreResult<bool>;
    async fn count_students(&self) -> CoreResult<i64>;
}
