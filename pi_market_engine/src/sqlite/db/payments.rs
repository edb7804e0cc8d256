use log::debug;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{NewPaymentRecord, OrderId, PaymentId, PaymentRecord, PiPaymentStatus},
    traits::{CompletionOutcome, InsertPaymentOutcome, PaymentStoreError},
};

/// Inserts a freshly approved payment record. The UNIQUE constraint on `payment_id` makes this
/// call safe under duplicate approval requests: the losing insert fetches and returns the row the
/// winner created.
pub async fn insert_approved(
    payment: NewPaymentRecord,
    conn: &mut SqliteConnection,
) -> Result<InsertPaymentOutcome, PaymentStoreError> {
    let pid = payment.payment_id.clone();
    let result = sqlx::query_as::<_, PaymentRecord>(
        r#"
            INSERT INTO payment_records (payment_id, user_id, amount, metadata)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(payment.payment_id)
    .bind(payment.user_id)
    .bind(payment.amount)
    .bind(Json(payment.metadata))
    .fetch_one(&mut *conn)
    .await;
    match result {
        Ok(record) => {
            debug!("🗃️ Payment record [{}] created with id {}", record.payment_id, record.id);
            Ok(InsertPaymentOutcome::Inserted(record))
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let existing =
                fetch_by_payment_id(&pid, conn).await?.ok_or(PaymentStoreError::PaymentNotFound(pid))?;
            Ok(InsertPaymentOutcome::AlreadyExists(existing))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_by_payment_id(
    payment_id: &PaymentId,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRecord>, PaymentStoreError> {
    let record = sqlx::query_as("SELECT * FROM payment_records WHERE payment_id = $1")
        .bind(payment_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(record)
}

/// Compare-and-swap completion: only an `Approved` record is moved to `Completed`. A record that
/// is already `Completed` reports a no-op; `Cancelled` and `Failed` records are terminal and the
/// transition is refused.
pub async fn mark_completed(
    payment_id: &PaymentId,
    txid: &str,
    conn: &mut SqliteConnection,
) -> Result<CompletionOutcome, PaymentStoreError> {
    let updated: Option<PaymentRecord> = sqlx::query_as(
        r#"
            UPDATE payment_records SET status = 'Completed', txid = $2, updated_at = CURRENT_TIMESTAMP
            WHERE payment_id = $1 AND status = 'Approved'
            RETURNING *;
        "#,
    )
    .bind(payment_id.as_str())
    .bind(txid)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(record) = updated {
        debug!("🗃️ Payment [{payment_id}] marked Completed with txid {txid}");
        return Ok(CompletionOutcome::Completed(record));
    }
    let existing = fetch_by_payment_id(payment_id, conn)
        .await?
        .ok_or_else(|| PaymentStoreError::PaymentNotFound(payment_id.clone()))?;
    match existing.status {
        PiPaymentStatus::Completed => Ok(CompletionOutcome::AlreadyCompleted(existing)),
        from => Err(PaymentStoreError::InvalidStatusChange {
            payment_id: payment_id.clone(),
            from,
            to: PiPaymentStatus::Completed,
        }),
    }
}

/// Moves an `Approved` record to the given terminal status (`Cancelled` or `Failed`). Idempotent
/// when the record is already in that status.
pub async fn mark_terminal(
    payment_id: &PaymentId,
    status: PiPaymentStatus,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<PaymentRecord, PaymentStoreError> {
    let updated: Option<PaymentRecord> = sqlx::query_as(
        r#"
            UPDATE payment_records SET status = $2, failure_reason = $3, updated_at = CURRENT_TIMESTAMP
            WHERE payment_id = $1 AND status = 'Approved'
            RETURNING *;
        "#,
    )
    .bind(payment_id.as_str())
    .bind(status.to_string())
    .bind(reason)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(record) = updated {
        return Ok(record);
    }
    let existing = fetch_by_payment_id(payment_id, conn)
        .await?
        .ok_or_else(|| PaymentStoreError::PaymentNotFound(payment_id.clone()))?;
    if existing.status == status {
        Ok(existing)
    } else {
        Err(PaymentStoreError::InvalidStatusChange { payment_id: payment_id.clone(), from: existing.status, to: status })
    }
}

/// Links a completed payment to the order it produced.
pub async fn link_order(
    payment_id: &PaymentId,
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentStoreError> {
    sqlx::query("UPDATE payment_records SET order_id = $2, updated_at = CURRENT_TIMESTAMP WHERE payment_id = $1")
        .bind(payment_id.as_str())
        .bind(order_id.as_str())
        .execute(conn)
        .await?;
    Ok(())
}
