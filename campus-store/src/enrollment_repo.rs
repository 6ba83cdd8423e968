use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use campus_core::model::Course;
use campus_core::repository::EnrollmentRepository;
use campus_core::{CoreError, CoreResult};

use crate::database::{is_unique_violation, storage_err};

pub struct StoreEnrollmentRepository {
    pool: PgPool,
}

impl StoreEnrollmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EnrolledCourseRow {
    id: Uuid,
    teacher_id: Uuid,
    name: String,
    description: Option<String>,
    price_cents: i64,
    max_seats: i32,
    enrolled_count: i32,
    is_open: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

#[async_trait]
impl EnrollmentRepository for StoreEnrollmentRepository {
    async fn is_enrolled(&self, student_id: Uuid, course_id: Uuid) -> CoreResult<bool> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT student_id FROM enrollments WHERE student_id = $1 AND course_id = $2",
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(row.is_some())
    }

    async fn add_enrollment(&self, student_id: Uuid, course_id: Uuid) -> CoreResult<()> {
        sqlx::query("INSERT INTO enrollments (student_id, course_id) VALUES ($1, $2)")
            .bind(student_id)
            .bind(course_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e, "enrollments_pkey") {
                    CoreError::AlreadyEnrolled(course_id)
                } else {
                    storage_err(e)
                }
            })?;
        Ok(())
    }

    async fn remove_enrollment(&self, student_id: Uuid, course_id: Uuid) -> CoreResult<()> {
        sqlx::query("DELETE FROM enrollments WHERE student_id = $1 AND course_id = $2")
            .bind(student_id)
            .bind(course_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn list_enrolled_courses(&self, student_id: Uuid) -> CoreResult<Vec<Course>> {
        let rows: Vec<EnrolledCourseRow> = sqlx::query_as(
            r#"
            SELECT c.id, c.teacher_id, c.name, c.description, c.price_cents, c.max_seats,
                   c.enrolled_count, c.is_open, c.created_at, c.updated_at
            FROM enrollments e
            JOIN courses c ON c.id = e.course_id
            WHERE e.student_id = $1
            ORDER BY e.enrolled_at
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows
            .into_iter()
            .map(|row| Course {
                id: row.id,
                teacher_id: row.teacher_id,
                name: row.name,
                description: row.description,
                price_cents: row.price_cents,
                max_seats: row.max_seats,
                enrolled_count: row.enrolled_count,
                is_open: row.is_open,
                created_at: row.created_at,
                updated_at: row.updated_at,
            })
            .collect())
    }
}
