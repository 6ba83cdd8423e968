use std::convert::Infallible;

use axum::{
    extract::{Extension, Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, patch, post, put},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use campus_core::model::Course;

use crate::error::ApiError;
use crate::middleware::auth::TeacherClaims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct CourseRequest {
    name: String,
    description: Option<String>,
    price_cents: i64,
    max_seats: i32,
}

#[derive(Debug, Deserialize)]
struct AvailabilityRequest {
    open: bool,
}

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/courses", get(list_courses))
        .route("/v1/courses/available", get(list_available_courses))
        .route("/v1/courses/stream", get(stream_availability))
        .route("/v1/courses/{id}", get(get_course))
}

pub fn teacher_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/teachers/{teacher_id}/courses",
            post(create_course).get(list_teacher_courses),
        )
        .route(
            "/v1/teachers/{teacher_id}/courses/{course_id}",
            put(update_course),
        )
        .route(
            "/v1/teachers/{teacher_id}/courses/{course_id}/availability",
            patch(set_availability),
        )
}

// ============================================================================
// Catalog (public, read-only)
// ============================================================================

async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<Course>>, ApiError> {
    Ok(Json(state.catalog.list_all().await?))
}

/// Reads the is_open projection only; nothing is reserved by looking.
async fn list_available_courses(
    State(state): State<AppState>,
) -> Result<Json<Vec<Course>>, ApiError> {
    Ok(Json(state.catalog.list_available().await?))
}

async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Course>, ApiError> {
    Ok(Json(state.catalog.get_course(id).await?))
}

/// SSE feed of seat-availability changes, fed by committed placements.
async fn stream_availability(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.availability_tx.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => {
                let data = serde_json::to_string(&event).ok()?;
                Some(Ok(Event::default().event("course_availability").data(data)))
            }
            // A lagging subscriber just misses events; the next read of
            // /v1/courses/available resynchronizes.
            Err(_) => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ============================================================================
// Teacher-owned administration
// ============================================================================

fn require_self(claims: &TeacherClaims, teacher_id: Uuid) -> Result<(), ApiError> {
    if claims.sub != teacher_id {
        return Err(ApiError::Forbidden(
            "token does not belong to this teacher".to_string(),
        ));
    }
    Ok(())
}

async fn create_course(
    State(state): State<AppState>,
    Path(teacher_id): Path<Uuid>,
    Extension(claims): Extension<TeacherClaims>,
    Json(req): Json<CourseRequest>,
) -> Result<Json<Course>, ApiError> {
    require_self(&claims, teacher_id)?;
    let course = state
        .catalog
        .create_course(
            teacher_id,
            req.name,
            req.description,
            req.price_cents,
            req.max_seats,
        )
        .await?;
    Ok(Json(course))
}

async fn list_teacher_courses(
    State(state): State<AppState>,
    Path(teacher_id): Path<Uuid>,
    Extension(claims): Extension<TeacherClaims>,
) -> Result<Json<Vec<Course>>, ApiError> {
    require_self(&claims, teacher_id)?;
    Ok(Json(state.catalog.list_for_teacher(teacher_id).await?))
}

async fn update_course(
    State(state): State<AppState>,
    Path((teacher_id, course_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<TeacherClaims>,
    Json(req): Json<CourseRequest>,
) -> Result<Json<Course>, ApiError> {
    require_self(&claims, teacher_id)?;
    let course = state
        .catalog
        .update_course(
            teacher_id,
            course_id,
            req.name,
            req.description,
            req.price_cents,
            req.max_seats,
        )
        .await?;
    Ok(Json(course))
}

async fn set_availability(
    State(state): State<AppState>,
    Path((teacher_id, course_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<TeacherClaims>,
    Json(req): Json<AvailabilityRequest>,
) -> Result<Json<Course>, ApiError> {
    require_self(&claims, teacher_id)?;
    let course = state
        .catalog
        .set_availability(teacher_id, course_id, req.open)
        .await?;
    if !req.open {
        // Nothing to announce on close; the availability listing already
        // reflects it on the next read.
        return Ok(Json(course));
    }
    crate::orders::publish_availability(&state, &[course.clone()]);
    Ok(Json(course))
}
