use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use campus_core::model::{Cart, CartLine};
use campus_core::repository::CartRepository;
use campus_core::{CoreError, CoreResult};

use crate::database::{is_fk_violation, is_unique_violation, storage_err};

pub struct StoreCartRepository {
    pool: PgPool,
}

impl StoreCartRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    student_id: Uuid,
    total_cents: i64,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: Uuid,
    course_id: Uuid,
    course_name: String,
    price_cents: i64,
    added_at: chrono::DateTime<chrono::Utc>,
}

impl StoreCartRepository {
    async fn load_lines(&self, cart_id: Uuid) -> CoreResult<Vec<CartLine>> {
        let rows: Vec<CartLineRow> = sqlx::query_as(
            r#"
            SELECT cl.id, cl.course_id, c.name AS course_name, c.price_cents, cl.added_at
            FROM cart_lines cl
            JOIN courses c ON c.id = cl.course_id
            WHERE cl.cart_id = $1
            ORDER BY cl.added_at
            "#,
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows
            .into_iter()
            .map(|row| CartLine {
                id: row.id,
                course_id: row.course_id,
                course_name: row.course_name,
                price_cents: row.price_cents,
                added_at: row.added_at,
            })
            .collect())
    }

    async fn assemble(&self, row: CartRow) -> CoreResult<Cart> {
        let lines = self.load_lines(row.id).await?;
        Ok(Cart {
            id: row.id,
            student_id: row.student_id,
            lines,
            total_cents: row.total_cents,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl CartRepository for StoreCartRepository {
    async fn get_cart(&self, student_id: Uuid) -> CoreResult<Option<Cart>> {
        let row: Option<CartRow> = sqlx::query_as(
            "SELECT id, student_id, total_cents, created_at, updated_at FROM carts WHERE student_id = $1",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        match row {
            Some(row) => Ok(Some(self.assemble(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_or_create_cart(&self, student_id: Uuid) -> CoreResult<Cart> {
        // Idempotent under races: the unique constraint on student_id makes
        // the second concurrent insert a no-op.
        sqlx::query(
            "INSERT INTO carts (id, student_id) VALUES ($1, $2) ON CONFLICT (student_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_fk_violation(&e, "carts_student_id_fkey") {
                CoreError::StudentNotFound(student_id)
            } else {
                storage_err(e)
            }
        })?;

        self.get_cart(student_id)
            .await?
            .ok_or_else(|| CoreError::CartNotFound(student_id))
    }

    async fn insert_line(&self, cart_id: Uuid, course_id: Uuid) -> CoreResult<()> {
        sqlx::query("INSERT INTO cart_lines (id, cart_id, course_id) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(cart_id)
            .bind(course_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e, "cart_lines_cart_course_key") {
                    CoreError::CourseAlreadyInCart(course_id)
                } else if is_fk_violation(&e, "cart_lines_course_id_fkey") {
                    CoreError::CourseNotFound(course_id)
                } else {
                    storage_err(e)
                }
            })?;
        Ok(())
    }

    async fn delete_line(&self, cart_id: Uuid, course_id: Uuid) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1 AND course_id = $2")
            .bind(cart_id)
            .bind(course_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_lines(&self, cart_id: Uuid) -> CoreResult<()> {
        sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn recompute_total(&self, cart_id: Uuid) -> CoreResult<i64> {
        // One statement so the cached total always matches the lines it
        // was computed from.
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE carts
            SET total_cents = COALESCE((
                    SELECT SUM(c.price_cents)
                    FROM cart_lines cl
                    JOIN courses c ON c.id = cl.course_id
                    WHERE cl.cart_id = carts.id
                ), 0),
                updated_at = now()
            WHERE id = $1
            RETURNING total_cents
            "#,
        )
        .bind(cart_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        match row {
            Some((total,)) => Ok(total),
            None => Err(CoreError::Storage(format!("cart {} has no row", cart_id))),
        }
    }
}
