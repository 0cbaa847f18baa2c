use chrono::NaiveTime;
use sqlx::PgPool;
use uuid::Uuid;

pub struct ScheduleRow {
    pub id: Uuid,
    pub terminal_id: Uuid,
    pub weekday: i16,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub tolerance_minutes: i32,
}

pub async fn list_for_terminal_weekday(
    pool: &PgPool,
    terminal_id: Uuid,
    weekday: i16,
) -> Result<Vec<ScheduleRow>, sqlx::Error> {
    sqlx::query_as!(
        ScheduleRow,
        r#"SELECT id, terminal_id, weekday, check_in, check_out, tolerance_minutes
           FROM terminal_schedules
           WHERE terminal_id = $1 AND weekday = $2 AND is_active = true
             AND (effective_from IS NULL OR effective_from <= CURRENT_DATE)
             AND (effective_until IS NULL OR effective_until >= CURRENT_DATE)"#,
        terminal_id,
        weekday
    )
    .fetch_all(pool)
    .await
}
