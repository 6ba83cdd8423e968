use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use campus_core::model::{Order, OrderLine, OrderStatus};
use campus_core::repository::OrderRepository;
use campus_core::{CoreError, CoreResult};

use crate::database::{is_unique_violation, storage_err};

pub struct StoreOrderRepository {
    pool: PgPool,
}

impl StoreOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_code: String,
    student_id: Uuid,
    status: String,
    total_cents: i64,
    created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    id: Uuid,
    order_id: Uuid,
    course_id: Uuid,
    course_name: String,
    price_cents: i64,
}

fn status_from_row(id: Uuid, status: &str) -> CoreResult<OrderStatus> {
    OrderStatus::parse(status)
        .ok_or_else(|| CoreError::Storage(format!("order {} has unknown status {}", id, status)))
}

impl StoreOrderRepository {
    async fn load_lines(&self, order_id: Uuid) -> CoreResult<Vec<OrderLine>> {
        let rows: Vec<OrderLineRow> = sqlx::query_as(
            "SELECT id, order_id, course_id, course_name, price_cents FROM order_lines WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows
            .into_iter()
            .map(|row| OrderLine {
                id: row.id,
                order_id: row.order_id,
                course_id: row.course_id,
                course_name: row.course_name,
                price_cents: row.price_cents,
            })
            .collect())
    }

    async fn assemble(&self, row: OrderRow) -> CoreResult<Order> {
        let status = status_from_row(row.id, &row.status)?;
        let lines = self.load_lines(row.id).await?;
        Ok(Order {
            id: row.id,
            order_code: row.order_code,
            student_id: row.student_id,
            status,
            total_cents: row.total_cents,
            lines,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl OrderRepository for StoreOrderRepository {
    async fn insert_order(&self, order: &Order) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, order_code, student_id, status, total_cents, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id)
        .bind(&order.order_code)
        .bind(order.student_id)
        .bind(order.status.as_str())
        .bind(order.total_cents)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "orders_order_code_key") {
                CoreError::DuplicateOrderCode(order.order_code.clone())
            } else {
                storage_err(e)
            }
        })?;

        for line in &order.lines {
            sqlx::query(
                r#"
                INSERT INTO order_lines (id, order_id, course_id, course_name, price_cents)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(line.id)
            .bind(line.order_id)
            .bind(line.course_id)
            .bind(&line.course_name)
            .bind(line.price_cents)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    async fn delete_order(&self, order_id: Uuid) -> CoreResult<()> {
        // Lines go with the order via ON DELETE CASCADE.
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn get_order_by_code(&self, code: &str) -> CoreResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(
            "SELECT id, order_code, student_id, status, total_cents, created_at FROM orders WHERE order_code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        match row {
            Some(row) => Ok(Some(self.assemble(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_orders_for_student(&self, student_id: Uuid) -> CoreResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            "SELECT id, order_code, student_id, status, total_cents, created_at FROM orders WHERE student_id = $1 ORDER BY created_at DESC",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.assemble(row).await?);
        }
        Ok(orders)
    }
}
