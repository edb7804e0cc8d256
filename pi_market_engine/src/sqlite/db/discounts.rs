use chrono::Utc;
use log::debug;
use pmg_common::MicroPi;
use sqlx::SqliteConnection;

use crate::{
    db_types::{DiscountCode, NewDiscountCode, OrderId},
    traits::{OrderFlowError, StoreApiError},
};

pub async fn insert_code(code: NewDiscountCode, conn: &mut SqliteConnection) -> Result<DiscountCode, StoreApiError> {
    let name = code.code.clone();
    let result = sqlx::query_as::<_, DiscountCode>(
        r#"
            INSERT INTO discount_codes (store_id, code, percent, expires_at, max_uses)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(code.store_id)
    .bind(code.code)
    .bind(code.percent)
    .bind(code.expires_at)
    .bind(code.max_uses)
    .fetch_one(conn)
    .await;
    result.map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => StoreApiError::DuplicateDiscountCode(name),
        e => e.into(),
    })
}

pub async fn fetch_code(
    store_id: i64,
    code: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<DiscountCode>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM discount_codes WHERE store_id = $1 AND code = $2")
        .bind(store_id)
        .bind(code)
        .fetch_optional(conn)
        .await
}

/// Validates the code and records its usage against the order, incrementing the use counter.
/// The increment is conditional on the counter still being below `max_uses`, so concurrent
/// completions cannot oversubscribe a code. Returns the discount amount applied.
pub async fn apply_code(
    store_id: i64,
    code: &str,
    order_id: &OrderId,
    user_id: i64,
    order_total: MicroPi,
    conn: &mut SqliteConnection,
) -> Result<MicroPi, OrderFlowError> {
    let discount = fetch_code(store_id, code, &mut *conn)
        .await?
        .ok_or_else(|| OrderFlowError::DiscountNotUsable(format!("unknown code {code}")))?;
    if !discount.is_usable(Utc::now()) {
        return Err(OrderFlowError::DiscountNotUsable(format!("code {code} is expired or fully used")));
    }
    let claimed = sqlx::query("UPDATE discount_codes SET uses = uses + 1 WHERE id = $1 AND uses < max_uses")
        .bind(discount.id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if claimed == 0 {
        return Err(OrderFlowError::DiscountNotUsable(format!("code {code} is fully used")));
    }
    let amount = discount.discount_on(order_total);
    sqlx::query("INSERT INTO discount_usages (discount_id, order_id, user_id, amount) VALUES ($1, $2, $3, $4)")
        .bind(discount.id)
        .bind(order_id.as_str())
        .bind(user_id)
        .bind(amount)
        .execute(conn)
        .await?;
    debug!("🗃️ Discount {code} applied to order {order_id}: {amount}");
    Ok(amount)
}
