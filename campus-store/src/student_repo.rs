use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use campus_core::model::Student;
use campus_core::repository::StudentRepository;
use campus_core::{CoreError, CoreResult};

use crate::database::{is_unique_violation, storage_err};

pub struct StoreStudentRepository {
    pool: PgPool,
}

impl StoreStudentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct StudentRow {
    id: Uuid,
    name: String,
    email: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<StudentRow> for Student {
    fn from(row: StudentRow) -> Self {
        Student {
            id: row.id,
            name: row.name,
            email: row.email,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl StudentRepository for StoreStudentRepository {
    async fn insert_student(&self, student: &Student) -> CoreResult<()> {
        sqlx::query("INSERT INTO students (id, name, email, created_at) VALUES ($1, $2, $3, $4)")
            .bind(student.id)
            .bind(&student.name)
            .bind(&student.email)
            .bind(student.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e, "students_email_key") {
                    CoreError::DuplicateEmail(student.email.clone())
                } else {
                    storage_err(e)
                }
            })?;
        Ok(())
    }

    async fn get_student(&self, id: Uuid) -> CoreResult<Option<Student>> {
        let row: Option<StudentRow> =
            sqlx::query_as("SELECT id, name, email, created_at FROM students WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_err)?;
        Ok(row.map(Into::into))
    }

    async fn list_students(&self) -> CoreResult<Vec<Student>> {
        let rows: Vec<StudentRow> =
            sqlx::query_as("SELECT id, name, email, created_at FROM students ORDER BY created_at")
                .fetch_all(&self.pool)
                .await
                .map_err(storage_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn student_exists(&self, id: Uuid) -> CoreResult<bool> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.is_some())
    }

    async fn count_students(&self) -> CoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM students")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(count)
    }
}
