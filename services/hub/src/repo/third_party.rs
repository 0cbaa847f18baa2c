use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

pub struct ThirdPartyConfigRow {
    pub id: Uuid,
    pub name: String,
    pub base_url: String,
    pub users_endpoint: String,
    pub attendance_endpoint: String,
    pub auth_type: String,
    pub auth_token: Option<String>,
    pub auth_header_name: Option<String>,
    pub extra_headers: Value,
    pub timeout_seconds: i32,
    pub retry_attempts: i32,
    pub sync_interval_minutes: i32,
    pub is_active: bool,
}

pub async fn list_active(pool: &PgPool) -> Result<Vec<ThirdPartyConfigRow>, sqlx::Error> {
    sqlx::query_as!(
        ThirdPartyConfigRow,
        r#"SELECT id, name, base_url, users_endpoint, attendance_endpoint, auth_type, auth_token,
                  auth_header_name, extra_headers, timeout_seconds, retry_attempts, sync_interval_minutes, is_active
           FROM third_party_configs WHERE is_active = true"#
    )
    .fetch_all(pool)
    .await
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<ThirdPartyConfigRow>, sqlx::Error> {
    sqlx::query_as!(
        ThirdPartyConfigRow,
        r#"SELECT id, name, base_url, users_endpoint, attendance_endpoint, auth_type, auth_token,
                  auth_header_name, extra_headers, timeout_seconds, retry_attempts, sync_interval_minutes, is_active
           FROM third_party_configs WHERE id = $1"#,
        id
    )
    .fetch_optional(pool)
    .await
}

pub struct MappingRow {
    pub id: Uuid,
    pub terminal_id: Uuid,
    pub config_id: Uuid,
    pub sync_users: bool,
    pub sync_attendance: bool,
    pub last_user_sync: Option<DateTime<Utc>>,
    pub last_attendance_sync: Option<DateTime<Utc>>,
}

pub async fn list_mappings_for_config(pool: &PgPool, config_id: Uuid) -> Result<Vec<MappingRow>, sqlx::Error> {
    sqlx::query_as!(
        MappingRow,
        r#"SELECT id, terminal_id, config_id, sync_users, sync_attendance, last_user_sync, last_attendance_sync
           FROM terminal_third_party_mappings WHERE config_id = $1 AND is_active = true"#,
        config_id
    )
    .fetch_all(pool)
    .await
}

pub async fn list_mappings_for_terminal(pool: &PgPool, terminal_id: Uuid) -> Result<Vec<MappingRow>, sqlx::Error> {
    sqlx::query_as!(
        MappingRow,
        r#"SELECT id, terminal_id, config_id, sync_users, sync_attendance, last_user_sync, last_attendance_sync
           FROM terminal_third_party_mappings WHERE terminal_id = $1 AND is_active = true"#,
        terminal_id
    )
    .fetch_all(pool)
    .await
}

pub async fn touch_last_user_sync(pool: &PgPool, mapping_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query!("UPDATE terminal_third_party_mappings SET last_user_sync = now() WHERE id = $1", mapping_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn touch_last_attendance_sync(pool: &PgPool, mapping_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query!("UPDATE terminal_third_party_mappings SET last_attendance_sync = now() WHERE id = $1", mapping_id)
        .execute(pool)
        .await?;
    Ok(())
}
