use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{CartLine, NewProduct, Product, ProductChoice},
    traits::{OrderFlowError, StoreApiError},
};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, StoreApiError> {
    let inserted: Product = sqlx::query_as(
        "INSERT INTO products (store_id, name, price, stock) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(product.store_id)
    .bind(product.name)
    .bind(product.price)
    .bind(product.stock)
    .fetch_one(&mut *conn)
    .await?;
    for (name, stock) in product.choices {
        sqlx::query("INSERT INTO product_choices (product_id, name, stock) VALUES ($1, $2, $3)")
            .bind(inserted.id)
            .bind(name)
            .bind(stock)
            .execute(&mut *conn)
            .await?;
    }
    Ok(inserted)
}

pub async fn fetch_product(id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_choices(product_id: i64, conn: &mut SqliteConnection) -> Result<Vec<ProductChoice>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM product_choices WHERE product_id = $1 ORDER BY name ASC")
        .bind(product_id)
        .fetch_all(conn)
        .await
}

/// Decrements stock for one purchased line. The decrement is conditional on sufficient stock
/// being available, so a shortfall shows up as zero affected rows rather than a negative stock
/// level. Lines with a choice touch only that choice's stock; plain lines touch the product's
/// top-level stock.
///
/// Call this inside the fulfilment transaction: an error from any line must roll back the
/// decrements already applied for the order's other lines.
pub async fn decrement_stock_for_line(line: &CartLine, conn: &mut SqliteConnection) -> Result<(), OrderFlowError> {
    let affected = match &line.choice {
        Some(choice) => {
            sqlx::query(
                "UPDATE product_choices SET stock = stock - $1 WHERE product_id = $2 AND name = $3 AND stock >= $1",
            )
            .bind(line.quantity)
            .bind(line.product_id)
            .bind(choice)
            .execute(&mut *conn)
            .await?
            .rows_affected()
        },
        None => {
            sqlx::query("UPDATE products SET stock = stock - $1 WHERE id = $2 AND stock >= $1")
                .bind(line.quantity)
                .bind(line.product_id)
                .execute(&mut *conn)
                .await?
                .rows_affected()
        },
    };
    if affected > 0 {
        trace!("🗃️ Decremented stock by {} for product {}", line.quantity, line.product_id);
        return Ok(());
    }
    // Zero rows: distinguish a missing product/choice from a genuine shortfall.
    match &line.choice {
        Some(choice) => {
            let exists: Option<ProductChoice> =
                sqlx::query_as("SELECT * FROM product_choices WHERE product_id = $1 AND name = $2")
                    .bind(line.product_id)
                    .bind(choice)
                    .fetch_optional(conn)
                    .await?;
            match exists {
                Some(_) => {
                    Err(OrderFlowError::InsufficientStock { product_id: line.product_id, choice: Some(choice.clone()) })
                },
                None => Err(OrderFlowError::ChoiceNotFound { product_id: line.product_id, choice: choice.clone() }),
            }
        },
        None => match fetch_product(line.product_id, conn).await? {
            Some(_) => Err(OrderFlowError::InsufficientStock { product_id: line.product_id, choice: None }),
            None => Err(OrderFlowError::ProductNotFound(line.product_id)),
        },
    }
}
