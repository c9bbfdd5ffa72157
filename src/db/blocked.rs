use sqlx::PgPool;

use crate::gate::log::BlockedSubmission;

pub async fn create(pool: &PgPool, entry: &BlockedSubmission) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO blocked_submissions (id, form_id, reason, actor, created_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(entry.id)
    .bind(&entry.form_id)
    .bind(&entry.reason)
    .bind(&entry.actor)
    .bind(entry.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_recent(pool: &PgPool, limit: i64) -> Result<Vec<BlockedSubmission>, sqlx::Error> {
    sqlx::query_as::<_, BlockedSubmission>(
        "SELECT id, form_id, reason, actor, created_at FROM blocked_submissions
         ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
