use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use campus_core::model::Course;
use campus_core::repository::CourseRepository;
use campus_core::{CoreError, CoreResult};

use crate::database::storage_err;

pub struct StoreCourseRepository {
    pool: PgPool,
}

impl StoreCourseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal struct for type-safe querying
#[derive(sqlx::FromRow)]
struct CourseRow {
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

impl From<CourseRow> for Course {
    fn from(row: CourseRow) -> Self {
        Course {
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
        }
    }
}

const COURSE_COLUMNS: &str = "id, teacher_id, name, description, price_cents, max_seats, enrolled_count, is_open, created_at, updated_at";

impl StoreCourseRepository {
    async fn course_exists(&self, id: Uuid) -> CoreResult<bool> {
        let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM courses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl CourseRepository for StoreCourseRepository {
    async fn insert_course(&self, course: &Course) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO courses (id, teacher_id, name, description, price_cents, max_seats, enrolled_count, is_open, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(course.id)
        .bind(course.teacher_id)
        .bind(&course.name)
        .bind(&course.description)
        .bind(course.price_cents)
        .bind(course.max_seats)
        .bind(course.enrolled_count)
        .bind(course.is_open)
        .bind(course.created_at)
        .bind(course.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn update_course_details(
        &self,
        id: Uuid,
        name: String,
        description: Option<String>,
        price_cents: i64,
        max_seats: i32,
    ) -> CoreResult<Course> {
        // Conditional update so the capacity floor is checked against the
        // live enrolled_count, not a value read earlier.
        let row: Option<CourseRow> = sqlx::query_as(&format!(
            r#"
            UPDATE courses
            SET name = $2,
                description = $3,
                price_cents = $4,
                max_seats = $5,
                is_open = CASE WHEN enrolled_count >= $5 THEN FALSE ELSE is_open END,
                updated_at = now()
            WHERE id = $1 AND enrolled_count <= $5
            RETURNING {COURSE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&name)
        .bind(&description)
        .bind(price_cents)
        .bind(max_seats)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        match row {
            Some(row) => Ok(row.into()),
            None if self.course_exists(id).await? => Err(CoreError::Validation(format!(
                "max_seats {} is below the students already enrolled",
                max_seats
            ))),
            None => Err(CoreError::CourseNotFound(id)),
        }
    }

    async fn get_course(&self, id: Uuid) -> CoreResult<Option<Course>> {
        let row: Option<CourseRow> =
            sqlx::query_as(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_err)?;
        Ok(row.map(Into::into))
    }

    async fn list_courses(&self) -> CoreResult<Vec<Course>> {
        let rows: Vec<CourseRow> =
            sqlx::query_as(&format!("SELECT {COURSE_COLUMNS} FROM courses ORDER BY created_at"))
                .fetch_all(&self.pool)
                .await
                .map_err(storage_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_available_courses(&self) -> CoreResult<Vec<Course>> {
        let rows: Vec<CourseRow> = sqlx::query_as(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE is_open AND enrolled_count < max_seats ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_courses_by_teacher(&self, teacher_id: Uuid) -> CoreResult<Vec<Course>> {
        let rows: Vec<CourseRow> = sqlx::query_as(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE teacher_id = $1 ORDER BY created_at"
        ))
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_courses(&self) -> CoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM courses")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(count)
    }

    async fn try_reserve_seat(&self, course_id: Uuid) -> CoreResult<bool> {
        // Single conditional update: check-and-increment cannot interleave
        // with a concurrent reservation reading the same count.
        let result = sqlx::query(
            r#"
            UPDATE courses
            SET enrolled_count = enrolled_count + 1,
                is_open = enrolled_count + 1 < max_seats,
                updated_at = now()
            WHERE id = $1 AND is_open AND enrolled_count < max_seats
            "#,
        )
        .bind(course_id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        if self.course_exists(course_id).await? {
            Ok(false)
        } else {
            Err(CoreError::CourseNotFound(course_id))
        }
    }

    async fn release_seat(&self, course_id: Uuid) -> CoreResult<()> {
        // All SET expressions see the pre-update row, so the fullness test
        // refers to the count before the decrement.
        let result = sqlx::query(
            r#"
            UPDATE courses
            SET is_open = CASE WHEN enrolled_count >= max_seats THEN TRUE ELSE is_open END,
                enrolled_count = enrolled_count - 1,
                updated_at = now()
            WHERE id = $1 AND enrolled_count > 0
            "#,
        )
        .bind(course_id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        // Zero rows is either "already at zero" (a no-op by contract) or a
        // missing course.
        if result.rows_affected() == 0 && !self.course_exists(course_id).await? {
            return Err(CoreError::CourseNotFound(course_id));
        }
        Ok(())
    }

    async fn set_open(&self, course_id: Uuid, open: bool) -> CoreResult<Course> {
        let row: Option<CourseRow> = if open {
            sqlx::query_as(&format!(
                r#"
                UPDATE courses
                SET is_open = TRUE, updated_at = now()
                WHERE id = $1 AND enrolled_count < max_seats
                RETURNING {COURSE_COLUMNS}
                "#
            ))
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?
        } else {
            sqlx::query_as(&format!(
                r#"
                UPDATE courses
                SET is_open = FALSE, updated_at = now()
                WHERE id = $1
                RETURNING {COURSE_COLUMNS}
                "#
            ))
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?
        };

        match row {
            Some(row) => Ok(row.into()),
            None if open && self.course_exists(course_id).await? => {
                Err(CoreError::ReopenAtCapacity(course_id))
            }
            None => Err(CoreError::CourseNotFound(course_id)),
        }
    }

    async fn peek_available(&self, course_id: Uuid) -> CoreResult<bool> {
        let row: Option<(bool,)> = sqlx::query_as(
            "SELECT is_open AND enrolled_count < max_seats FROM courses WHERE id = $1",
        )
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        match row {
            Some((available,)) => Ok(available),
            None => Err(CoreError::CourseNotFound(course_id)),
        }
    }
}
