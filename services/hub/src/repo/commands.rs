use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

pub struct CommandRow {
    pub id: Uuid,
    pub terminal_id: Uuid,
    pub command: String,
    pub payload: Value,
    pub status: String,
    pub retry_count: i32,
}

pub async fn enqueue(pool: &PgPool, terminal_id: Uuid, command: &str, payload: Value) -> Result<Uuid, sqlx::Error> {
    let row = sqlx::query!(
        "INSERT INTO command_queue (terminal_id, command, payload) VALUES ($1, $2, $3) RETURNING id",
        terminal_id,
        command,
        payload
    )
    .fetch_one(pool)
    .await?;
    Ok(row.id)
}

/// Commands still pending for a terminal, oldest first -- drained on
/// reconnect (§8, "Command queue drain on reconnect").
pub async fn list_pending(pool: &PgPool, terminal_id: Uuid) -> Result<Vec<CommandRow>, sqlx::Error> {
    sqlx::query_as!(
        CommandRow,
        r#"SELECT id, terminal_id, command, payload, status, retry_count
           FROM command_queue WHERE terminal_id = $1 AND status = 'pending' ORDER BY created_at ASC"#,
        terminal_id
    )
    .fetch_all(pool)
    .await
}

pub async fn mark_sent(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query!("UPDATE command_queue SET status = 'sent', sent_at = now() WHERE id = $1", id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_result(pool: &PgPool, id: Uuid, status: &str) -> Result<(), sqlx::Error> {
    sqlx::query!(
        "UPDATE command_queue SET status = $1, completed_at = now() WHERE id = $2",
        status,
        id
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn increment_retry(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query!("UPDATE command_queue SET retry_count = retry_count + 1 WHERE id = $1", id)
        .execute(pool)
        .await?;
    Ok(())
}
