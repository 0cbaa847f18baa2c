use sqlx::PgPool;
use uuid::Uuid;

pub struct CredentialRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub backup_type: i16,
    pub payload: String,
}

pub async fn upsert(pool: &PgPool, user_id: Uuid, backup_type: i16, payload: &str) -> Result<CredentialRow, sqlx::Error> {
    sqlx::query_as!(
        CredentialRow,
        r#"INSERT INTO biometric_credentials (user_id, backup_type, payload)
           VALUES ($1, $2, $3)
           ON CONFLICT (user_id, backup_type) DO UPDATE SET payload = EXCLUDED.payload, updated_at = now()
           RETURNING id, user_id, backup_type, payload"#,
        user_id,
        backup_type,
        payload
    )
    .fetch_one(pool)
    .await
}

pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<CredentialRow>, sqlx::Error> {
    sqlx::query_as!(
        CredentialRow,
        "SELECT id, user_id, backup_type, payload FROM biometric_credentials WHERE user_id = $1",
        user_id
    )
    .fetch_all(pool)
    .await
}
