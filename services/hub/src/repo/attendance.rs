use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

pub struct AttendanceLogRow {
    pub id: Uuid,
    pub terminal_id: Uuid,
    pub enrollid: i64,
    pub punch_time: DateTime<Utc>,
    pub raw_payload: Value,
    pub access_granted: bool,
    pub sync_status: String,
    pub sync_attempts: i32,
}

/// Inserts one attendance log row against any Postgres executor -- a plain
/// pool connection, or (§4.2.2, §5) a transaction shared across every
/// record in a `sendlog` batch so the whole batch commits or rolls back
/// together.
#[allow(clippy::too_many_arguments)]
pub async fn insert_log<'c, E>(
    executor: E,
    terminal_id: Uuid,
    user_id: Option<Uuid>,
    enrollid: i64,
    punch_time: DateTime<Utc>,
    mode: Option<i32>,
    inout: i16,
    event: Option<i32>,
    temperature: Option<f64>,
    image: Option<&str>,
    raw_payload: Value,
    access_granted: bool,
) -> Result<Uuid, sqlx::Error>
where
    E: sqlx::PgExecutor<'c>,
{
    let row = sqlx::query!(
        r#"INSERT INTO attendance_logs
               (terminal_id, user_id, enrollid, punch_time, mode, inout, event, temperature, image, raw_payload, access_granted)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
           RETURNING id"#,
        terminal_id,
        user_id,
        enrollid,
        punch_time,
        mode,
        inout,
        event,
        temperature,
        image,
        raw_payload,
        access_granted,
    )
    .fetch_one(executor)
    .await?;
    Ok(row.id)
}

pub struct LastPunchRow {
    pub inout: i16,
    pub punch_time: DateTime<Utc>,
}

pub async fn last_punch(pool: &PgPool, terminal_id: Uuid, enrollid: i64) -> Result<Option<LastPunchRow>, sqlx::Error> {
    sqlx::query_as!(
        LastPunchRow,
        r#"SELECT inout, punch_time FROM attendance_logs
           WHERE terminal_id = $1 AND enrollid = $2
           ORDER BY punch_time DESC LIMIT 1"#,
        terminal_id,
        enrollid
    )
    .fetch_optional(pool)
    .await
}

/// Logs never yet attempted (§4.6's primary drain-pending pass). Attempt
/// count is zero so there is no backoff window to honor.
pub async fn select_pending_batch(
    pool: &PgPool,
    terminal_id: Uuid,
    limit: i64,
) -> Result<Vec<AttendanceLogRow>, sqlx::Error> {
    sqlx::query_as!(
        AttendanceLogRow,
        r#"SELECT id, terminal_id, enrollid, punch_time, raw_payload, access_granted, sync_status, sync_attempts
           FROM attendance_logs
           WHERE terminal_id = $1 AND sync_status = 'pending'
           ORDER BY punch_time ASC
           LIMIT $2"#,
        terminal_id,
        limit
    )
    .fetch_all(pool)
    .await
}

/// Failed logs whose backoff window has elapsed, excluding rows that have
/// already exhausted `max_retry` attempts -- those are terminal (§4.6,
/// §8: a row reaches `failed` for good after exactly `MAX_RETRY`
/// increments and the retry pass must not keep selecting it). The backoff
/// per attempt follows the documented `{1, 5, 15, 60, 240}` minute table.
pub async fn select_retry_batch(
    pool: &PgPool,
    terminal_id: Uuid,
    max_retry: i32,
    limit: i64,
) -> Result<Vec<AttendanceLogRow>, sqlx::Error> {
    sqlx::query_as!(
        AttendanceLogRow,
        r#"SELECT id, terminal_id, enrollid, punch_time, raw_payload, access_granted, sync_status, sync_attempts
           FROM attendance_logs
           WHERE terminal_id = $1
             AND sync_status = 'failed'
             AND sync_attempts < $2
             AND updated_at <= now() - (CASE
                    WHEN sync_attempts <= 1 THEN interval '1 minute'
                    WHEN sync_attempts = 2 THEN interval '5 minutes'
                    WHEN sync_attempts = 3 THEN interval '15 minutes'
                    WHEN sync_attempts = 4 THEN interval '60 minutes'
                    ELSE interval '240 minutes'
                 END)
           ORDER BY punch_time ASC
           LIMIT $3"#,
        terminal_id,
        max_retry,
        limit
    )
    .fetch_all(pool)
    .await
}

pub async fn mark_sent(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query!(
        "UPDATE attendance_logs SET sync_status = 'sent', synced_at = now(), sync_error = NULL, updated_at = now() WHERE id = $1",
        id
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_failed(pool: &PgPool, id: Uuid, error: &str) -> Result<(), sqlx::Error> {
    sqlx::query!(
        r#"UPDATE attendance_logs SET sync_status = 'failed', sync_attempts = sync_attempts + 1, sync_error = $1, updated_at = now()
           WHERE id = $2"#,
        error,
        id
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Resets every failed row for a terminal back to `pending` for a fresh
/// retry pass, including rows that already hit `max_retry` -- this is the
/// explicit operator recovery path, triggered via the sync API.
pub async fn reset_failed(pool: &PgPool, terminal_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query!(
        r#"UPDATE attendance_logs SET sync_status = 'pending', sync_attempts = 0, sync_error = NULL, updated_at = now()
           WHERE terminal_id = $1 AND sync_status = 'failed'"#,
        terminal_id
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Defers a rate-limited row by `retry_after` without burning a retry
/// attempt (§4.6 rate limiting, §6) -- a 429 is the remote's throttle
/// signal, not evidence the row itself is bad.
pub async fn defer_retry(pool: &PgPool, id: Uuid, retry_after: std::time::Duration, error: &str) -> Result<(), sqlx::Error> {
    let retry_after_secs = retry_after.as_secs() as f64;
    sqlx::query!(
        r#"UPDATE attendance_logs
           SET sync_status = 'failed', sync_error = $1, updated_at = now() + make_interval(secs => $2)
           WHERE id = $3"#,
        error,
        retry_after_secs,
        id
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Deletes terminally-failed rows (`sync_attempts >= max_retry`) past the
/// retention window. Rows still within their retry budget are untouched
/// regardless of age.
pub async fn purge_exhausted_failures(pool: &PgPool, max_retry: i32, older_than_days: i32) -> Result<u64, sqlx::Error> {
    let result = sqlx::query!(
        r#"DELETE FROM attendance_logs
           WHERE sync_status = 'failed' AND sync_attempts >= $1 AND updated_at < now() - make_interval(days => $2)"#,
        max_retry,
        older_than_days
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
