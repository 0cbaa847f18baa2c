use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub struct UserRow {
    pub id: Uuid,
    pub terminal_id: Uuid,
    pub enrollid: i64,
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub admin_level: i16,
    pub is_enabled: bool,
    pub starttime: Option<DateTime<Utc>>,
    pub endtime: Option<DateTime<Utc>>,
    pub sync_status: String,
}

pub async fn get_by_terminal_and_enrollid(
    pool: &PgPool,
    terminal_id: Uuid,
    enrollid: i64,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as!(
        UserRow,
        r#"SELECT id, terminal_id, enrollid, external_id, name, admin_level, is_enabled, starttime, endtime, sync_status
           FROM biometric_users WHERE terminal_id = $1 AND enrollid = $2"#,
        terminal_id,
        enrollid
    )
    .fetch_optional(pool)
    .await
}

pub async fn get_by_terminal_and_external_id(
    pool: &PgPool,
    terminal_id: Uuid,
    external_id: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as!(
        UserRow,
        r#"SELECT id, terminal_id, enrollid, external_id, name, admin_level, is_enabled, starttime, endtime, sync_status
           FROM biometric_users WHERE terminal_id = $1 AND external_id = $2"#,
        terminal_id,
        external_id
    )
    .fetch_optional(pool)
    .await
}

pub async fn list_enrollids(pool: &PgPool, terminal_id: Uuid) -> Result<Vec<i64>, sqlx::Error> {
    let rows = sqlx::query!("SELECT enrollid FROM biometric_users WHERE terminal_id = $1", terminal_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|r| r.enrollid).collect())
}

/// Upserts a user pushed by a terminal's `senduser` command -- identity is
/// `(terminal_id, enrollid)` since the terminal is the source of truth for
/// its own enrollid assignment.
#[allow(clippy::too_many_arguments)]
pub async fn upsert_from_terminal(
    pool: &PgPool,
    terminal_id: Uuid,
    enrollid: i64,
    name: Option<&str>,
    admin_level: i16,
    user_group: Option<i32>,
    starttime: Option<DateTime<Utc>>,
    endtime: Option<DateTime<Utc>>,
) -> Result<UserRow, sqlx::Error> {
    sqlx::query_as!(
        UserRow,
        r#"INSERT INTO biometric_users (terminal_id, enrollid, name, admin_level, user_group, starttime, endtime, sync_status)
           VALUES ($1, $2, $3, $4, $5, $6, $7, 'local')
           ON CONFLICT (terminal_id, enrollid) DO UPDATE SET
               name = EXCLUDED.name,
               admin_level = EXCLUDED.admin_level,
               user_group = EXCLUDED.user_group,
               starttime = EXCLUDED.starttime,
               endtime = EXCLUDED.endtime,
               updated_at = now()
           RETURNING id, terminal_id, enrollid, external_id, name, admin_level, is_enabled, starttime, endtime, sync_status"#,
        terminal_id,
        enrollid,
        name,
        admin_level,
        user_group,
        starttime,
        endtime,
    )
    .fetch_one(pool)
    .await
}

/// Upserts a user pulled from a third-party system -- identity is
/// `(terminal_id, external_id)`; `enrollid` is assigned by the caller
/// before this is called (see `enrollid::smallest_free_enrollid`).
#[allow(clippy::too_many_arguments)]
pub async fn upsert_from_third_party(
    pool: &PgPool,
    terminal_id: Uuid,
    external_id: &str,
    enrollid: i64,
    name: Option<&str>,
    source_config_id: Uuid,
) -> Result<UserRow, sqlx::Error> {
    sqlx::query_as!(
        UserRow,
        r#"INSERT INTO biometric_users (terminal_id, external_id, enrollid, name, source_config_id, sync_status)
           VALUES ($1, $2, $3, $4, $5, 'pending_sync')
           ON CONFLICT (terminal_id, external_id) WHERE external_id IS NOT NULL AND external_id != '' DO UPDATE SET
               name = EXCLUDED.name,
               sync_status = 'pending_sync',
               updated_at = now()
           RETURNING id, terminal_id, enrollid, external_id, name, admin_level, is_enabled, starttime, endtime, sync_status"#,
        terminal_id,
        external_id,
        enrollid,
        name,
        source_config_id,
    )
    .fetch_one(pool)
    .await
}

pub async fn list_pending_sync(pool: &PgPool, terminal_id: Uuid) -> Result<Vec<UserRow>, sqlx::Error> {
    sqlx::query_as!(
        UserRow,
        r#"SELECT id, terminal_id, enrollid, external_id, name, admin_level, is_enabled, starttime, endtime, sync_status
           FROM biometric_users WHERE terminal_id = $1 AND sync_status = 'pending_sync'"#,
        terminal_id
    )
    .fetch_all(pool)
    .await
}

pub async fn set_sync_status(pool: &PgPool, user_id: Uuid, status: &str) -> Result<(), sqlx::Error> {
    sqlx::query!(
        "UPDATE biometric_users SET sync_status = $1, last_synced_at = now(), updated_at = now() WHERE id = $2",
        status,
        user_id
    )
    .execute(pool)
    .await?;
    Ok(())
}
