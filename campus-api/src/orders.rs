use axum::{
    extract::{Extension, Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use tracing::debug;

use campus_core::model::{Course, Order};
use campus_core::repository::CourseRepository as _;
use campus_shared::events::{CourseAvailabilityEvent, OrderPlacedEvent};

use crate::error::ApiError;
use crate::middleware::auth::StudentClaims;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", post(place_order).get(list_orders))
        .route("/v1/orders/{code}", get(get_order))
}

/// POST /v1/orders
/// Convert the authenticated student's cart into a completed order.
async fn place_order(
    State(state): State<AppState>,
    Extension(claims): Extension<StudentClaims>,
) -> Result<Json<Order>, ApiError> {
    let order = state.fulfillment.place_order(claims.sub).await?;

    let event = OrderPlacedEvent {
        order_id: order.id,
        order_code: order.order_code.clone(),
        student_id: order.student_id,
        total_cents: order.total_cents,
        line_count: order.lines.len() as i32,
        occurred_at: Utc::now().timestamp(),
    };
    debug!(payload = %serde_json::to_string(&event).unwrap_or_default(), "order placed event");

    // Announce the new seat counts to availability subscribers.
    let mut changed = Vec::with_capacity(order.lines.len());
    for line in &order.lines {
        if let Ok(Some(course)) = state.courses.get_course(line.course_id).await {
            changed.push(course);
        }
    }
    publish_availability(&state, &changed);

    Ok(Json(order))
}

/// GET /v1/orders/{code}
/// Orders are only visible to the student who placed them.
async fn get_order(
    State(state): State<AppState>,
    Extension(claims): Extension<StudentClaims>,
    Path(code): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order = state.fulfillment.order_for_code(&code).await?;
    if order.student_id != claims.sub {
        return Err(ApiError::Forbidden(
            "order belongs to another student".to_string(),
        ));
    }
    Ok(Json(order))
}

/// GET /v1/orders
async fn list_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<StudentClaims>,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.fulfillment.orders_for_student(claims.sub).await?))
}

/// Push the current seat state of each course onto the SSE broadcast.
/// Send failures only mean nobody is listening.
pub(crate) fn publish_availability(state: &AppState, courses: &[Course]) {
    for course in courses {
        let _ = state.availability_tx.send(CourseAvailabilityEvent {
            course_id: course.id,
            enrolled_count: course.enrolled_count,
            max_seats: course.max_seats,
            is_open: course.is_open,
            occurred_at: Utc::now().timestamp(),
        });
    }
}
