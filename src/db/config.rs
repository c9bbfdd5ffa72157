use sqlx::PgPool;
use sqlx::types::Json;

use crate::settings::ProtectionConfig;

pub async fn find(pool: &PgPool, name: &str) -> Result<Option<ProtectionConfig>, sqlx::Error> {
    let row = sqlx::query_scalar::<_, Json<ProtectionConfig>>(
        "SELECT data FROM config WHERE name = $1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|Json(config)| config))
}

pub async fn upsert(pool: &PgPool, name: &str, config: &ProtectionConfig) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO config (name, data) VALUES ($1, $2)
         ON CONFLICT (name) DO UPDATE SET data = EXCLUDED.data, updated_at = now()",
    )
    .bind(name)
    .bind(Json(config))
    .execute(pool)
    .await?;
    Ok(())
}
