use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use tm20_protocol::inbound::DevInfo;

pub struct TerminalRow {
    pub id: Uuid,
    pub sn: String,
    pub is_active: bool,
    pub is_whitelisted: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

pub async fn get_by_sn(pool: &PgPool, sn: &str) -> Result<Option<TerminalRow>, sqlx::Error> {
    sqlx::query_as!(
        TerminalRow,
        "SELECT id, sn, is_active, is_whitelisted, last_seen FROM terminals WHERE sn = $1",
        sn
    )
    .fetch_optional(pool)
    .await
}

/// Creates the terminal on first contact, or refreshes its reported
/// capabilities and marks it active on every subsequent `reg`.
pub async fn upsert_from_registration(
    pool: &PgPool,
    sn: &str,
    cpusn: &str,
    devinfo: &DevInfo,
) -> Result<TerminalRow, sqlx::Error> {
    sqlx::query_as!(
        TerminalRow,
        r#"INSERT INTO terminals (sn, cpusn, model, firmware, mac, user_capacity, fp_capacity, card_capacity, log_capacity, last_seen, is_active)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now(), true)
           ON CONFLICT (sn) DO UPDATE SET
               cpusn = EXCLUDED.cpusn,
               model = COALESCE(EXCLUDED.model, terminals.model),
               firmware = COALESCE(EXCLUDED.firmware, terminals.firmware),
               mac = COALESCE(EXCLUDED.mac, terminals.mac),
               user_capacity = COALESCE(EXCLUDED.user_capacity, terminals.user_capacity),
               fp_capacity = COALESCE(EXCLUDED.fp_capacity, terminals.fp_capacity),
               card_capacity = COALESCE(EXCLUDED.card_capacity, terminals.card_capacity),
               log_capacity = COALESCE(EXCLUDED.log_capacity, terminals.log_capacity),
               last_seen = now(),
               is_active = true,
               updated_at = now()
           RETURNING id, sn, is_active, is_whitelisted, last_seen"#,
        sn,
        cpusn,
        devinfo.modelname,
        devinfo.firmware,
        devinfo.mac,
        devinfo.usersize,
        devinfo.fpsize,
        devinfo.cardsize,
        devinfo.logsize,
    )
    .fetch_one(pool)
    .await
}

pub async fn set_active(pool: &PgPool, sn: &str, active: bool) -> Result<(), sqlx::Error> {
    sqlx::query!(
        "UPDATE terminals SET is_active = $1, updated_at = now() WHERE sn = $2",
        active,
        sn
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn touch_last_seen(pool: &PgPool, sn: &str) -> Result<(), sqlx::Error> {
    sqlx::query!("UPDATE terminals SET last_seen = now() WHERE sn = $1", sn)
        .execute(pool)
        .await?;
    Ok(())
}
