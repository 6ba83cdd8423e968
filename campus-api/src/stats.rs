use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use campus_core::repository::{CourseRepository as _, StudentRepository as _};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct StatsResponse {
    students: i64,
    courses: i64,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/stats", get(get_stats))
}

async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let students = state.students.count_students().await?;
    let courses = state.courses.count_courses().await?;
    Ok(Json(StatsResponse { students, courses }))
}
