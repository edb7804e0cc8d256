use sqlx::SqliteConnection;

use crate::db_types::Notification;

pub async fn insert(user_id: i64, body: &str, conn: &mut SqliteConnection) -> Result<Notification, sqlx::Error> {
    sqlx::query_as("INSERT INTO notifications (user_id, body) VALUES ($1, $2) RETURNING *")
        .bind(user_id)
        .bind(body)
        .fetch_one(conn)
        .await
}

pub async fn fetch_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Notification>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await
}

pub async fn mark_read(id: i64, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let affected = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = $1").bind(id).execute(conn).await?;
    Ok(affected.rows_affected())
}
