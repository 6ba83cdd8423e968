use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use campus_core::model::{Course, Student};
use campus_core::repository::StudentRepository as _;
use campus_core::CoreError;
use campus_shared::pii::{mask_email, Masked};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct RegisterStudentRequest {
    name: String,
    email: String,
}

#[derive(Debug, Serialize)]
pub struct StudentResponse {
    pub id: Uuid,
    pub name: String,
    pub email: Masked<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Student> for StudentResponse {
    fn from(student: Student) -> Self {
        Self {
            id: student.id,
            name: student.name,
            email: Masked(student.email),
            created_at: student.created_at,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/students", post(register_student).get(list_students))
        .route("/v1/students/{id}", get(get_student))
        .route("/v1/students/{id}/courses", get(enrolled_courses))
}

async fn register_student(
    State(state): State<AppState>,
    Json(req): Json<RegisterStudentRequest>,
) -> Result<Json<StudentResponse>, ApiError> {
    let student = Student::new(req.name, req.email)?;
    state.students.insert_student(&student).await?;
    info!(student_id = %student.id, email = %mask_email(&student.email), "student registered");
    Ok(Json(student.into()))
}

async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StudentResponse>, ApiError> {
    let student = state
        .students
        .get_student(id)
        .await?
        .ok_or(CoreError::StudentNotFound(id))?;
    Ok(Json(student.into()))
}

async fn list_students(
    State(state): State<AppState>,
) -> Result<Json<Vec<StudentResponse>>, ApiError> {
    let students = state.students.list_students().await?;
    Ok(Json(students.into_iter().map(Into::into).collect()))
}

async fn enrolled_courses(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Course>>, ApiError> {
    Ok(Json(state.catalog.enrolled_courses(id).await?))
}
