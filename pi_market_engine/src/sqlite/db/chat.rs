use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{ChatMessage, Conversation, OrderId},
    traits::OrderFlowError,
};

pub async fn open_conversation(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Conversation, sqlx::Error> {
    sqlx::query_as("INSERT INTO conversations (order_id) VALUES ($1) RETURNING *")
        .bind(order_id.as_str())
        .fetch_one(conn)
        .await
}

pub async fn conversation_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Conversation>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM conversations WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await
}

/// Archives the order's conversation. No further messages can be posted once this has run.
pub async fn archive_for_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let affected = sqlx::query("UPDATE conversations SET archived = 1 WHERE order_id = $1")
        .bind(order_id.as_str())
        .execute(conn)
        .await?
        .rows_affected();
    debug!("🗃️ Conversation for order {order_id} archived");
    Ok(affected)
}

/// Inserts a message, conditionally on the conversation still being open. The archived check and
/// the insert are a single statement, so a concurrent delivery cannot slip a message into a
/// just-archived conversation.
pub async fn post_message(
    order_id: &OrderId,
    sender_id: i64,
    body: &str,
    conn: &mut SqliteConnection,
) -> Result<ChatMessage, OrderFlowError> {
    let message: Option<ChatMessage> = sqlx::query_as(
        r#"
            INSERT INTO chat_messages (conversation_id, sender_id, body)
            SELECT id, $2, $3 FROM conversations WHERE order_id = $1 AND archived = 0
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(sender_id)
    .bind(body)
    .fetch_optional(&mut *conn)
    .await?;
    match message {
        Some(m) => Ok(m),
        None => match conversation_for_order(order_id, conn).await? {
            Some(_) => Err(OrderFlowError::ConversationArchived(order_id.clone())),
            None => Err(OrderFlowError::ConversationNotFound(order_id.clone())),
        },
    }
}

pub async fn messages_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<ChatMessage>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT chat_messages.* FROM chat_messages
            JOIN conversations ON chat_messages.conversation_id = conversations.id
            WHERE conversations.order_id = $1
            ORDER BY chat_messages.created_at ASC;
        "#,
    )
    .bind(order_id.as_str())
    .fetch_all(conn)
    .await
}
