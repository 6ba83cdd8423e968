use uuid::Uuid;

/// Coarse error class used by the API layer to pick an HTTP status and by
/// callers to decide whether a retry can help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidState,
    PreconditionFailed,
    Forbidden,
    Validation,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Student not found: {0}")]
    StudentNotFound(Uuid),

    #[error("Course not found: {0}")]
    CourseNotFound(Uuid),

    #[error("Cart not found for student: {0}")]
    CartNotFound(Uuid),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Course already in cart: {0}")]
    CourseAlreadyInCart(Uuid),

    #[error("Course not in cart: {0}")]
    CourseNotInCart(Uuid),

    #[error("Student already owns course: {0}")]
    AlreadyEnrolled(Uuid),

    #[error("Course is not open for enrollment: {0}")]
    CourseNotOpen(Uuid),

    #[error("No seats left on course: {0}")]
    CapacityExhausted(Uuid),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Order code already taken: {0}")]
    DuplicateOrderCode(String),

    #[error("Could not allocate a unique order code after retries")]
    OrderCodeExhausted,

    #[error("Course is at capacity and cannot be reopened: {0}")]
    ReopenAtCapacity(Uuid),

    #[error("Course {0} does not belong to this teacher")]
    NotCourseOwner(Uuid),

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::StudentNotFound(_)
            | CoreError::CourseNotFound(_)
            | CoreError::CartNotFound(_)
            | CoreError::OrderNotFound(_)
            | CoreError::CourseNotInCart(_) => ErrorKind::NotFound,

            CoreError::CourseAlreadyInCart(_)
            | CoreError::AlreadyEnrolled(_)
            | CoreError::CapacityExhausted(_)
            | CoreError::DuplicateOrderCode(_)
            | CoreError::OrderCodeExhausted
            | CoreError::DuplicateEmail(_) => ErrorKind::Conflict,

            CoreError::CourseNotOpen(_) | CoreError::EmptyCart => ErrorKind::InvalidState,

            CoreError::ReopenAtCapacity(_) => ErrorKind::PreconditionFailed,

            CoreError::NotCourseOwner(_) => ErrorKind::Forbidden,

            CoreError::Validation(_) => ErrorKind::Validation,

            CoreError::Storage(_) => ErrorKind::Internal,
        }
    }

    /// True for failures where repeating the whole placement may succeed
    /// once the contended resource settles.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::CapacityExhausted(_)
                | CoreError::DuplicateOrderCode(_)
                | CoreError::OrderCodeExhausted
        )
    }
}
