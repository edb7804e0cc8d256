use chrono::{DateTime, Utc};
use log::debug;
use pmg_common::MicroPi;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPayout, OrderId, Payout, PayoutTask},
    traits::PayoutStoreError,
};

/// Records a payout attempt. Attempt rows are insert-only; retries add new rows.
pub async fn insert_payout(payout: NewPayout, conn: &mut SqliteConnection) -> Result<Payout, PayoutStoreError> {
    let inserted: Payout = sqlx::query_as(
        r#"
            INSERT INTO payouts (order_id, store_id, amount, status, txid, failure_reason, attempt)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(payout.order_id)
    .bind(payout.store_id)
    .bind(payout.amount)
    .bind(payout.status.to_string())
    .bind(payout.txid)
    .bind(payout.failure_reason)
    .bind(payout.attempt)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Payout attempt {} for order {} recorded as {}", inserted.attempt, inserted.order_id, inserted.status);
    Ok(inserted)
}

pub async fn fetch_payout(id: i64, conn: &mut SqliteConnection) -> Result<Option<Payout>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payouts WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_payouts_for_store(store_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Payout>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payouts WHERE store_id = $1 ORDER BY created_at ASC")
        .bind(store_id)
        .fetch_all(conn)
        .await
}

pub async fn attempts_for_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payouts WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_one(conn)
        .await?;
    Ok(count)
}

//--------------------------------------   Payout task queue  --------------------------------------------------------

pub async fn enqueue_task(
    order_id: &OrderId,
    store_id: i64,
    amount: MicroPi,
    run_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PayoutTask, PayoutStoreError> {
    let task: PayoutTask = sqlx::query_as(
        "INSERT INTO payout_tasks (order_id, store_id, amount, run_at) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(order_id.as_str())
    .bind(store_id)
    .bind(amount)
    .bind(run_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Payout task {} queued for order {order_id}, due {}", task.id, task.run_at);
    Ok(task)
}

/// Tasks whose `run_at` has passed, oldest first. `unixepoch` keeps the comparison correct across
/// the slightly different timestamp formats sqlite and the driver produce.
pub async fn due_tasks(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<PayoutTask>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM payout_tasks
            WHERE unixepoch(run_at) <= unixepoch(CURRENT_TIMESTAMP)
            ORDER BY unixepoch(run_at) ASC
            LIMIT $1;
        "#,
    )
    .bind(limit)
    .fetch_all(conn)
    .await
}

pub async fn reschedule_task(
    task_id: i64,
    run_at: DateTime<Utc>,
    error: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<PayoutTask, PayoutStoreError> {
    let task: Option<PayoutTask> = sqlx::query_as(
        "UPDATE payout_tasks SET run_at = $2, attempts = attempts + 1, last_error = $3 WHERE id = $1 RETURNING *",
    )
    .bind(task_id)
    .bind(run_at)
    .bind(error)
    .fetch_optional(conn)
    .await?;
    task.ok_or(PayoutStoreError::TaskNotFound(task_id))
}

pub async fn remove_task(task_id: i64, conn: &mut SqliteConnection) -> Result<(), PayoutStoreError> {
    sqlx::query("DELETE FROM payout_tasks WHERE id = $1").bind(task_id).execute(conn).await?;
    Ok(())
}

/// All queued tasks for an order, used by tests and admin queries.
pub async fn tasks_for_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<PayoutTask>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payout_tasks WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await
}
