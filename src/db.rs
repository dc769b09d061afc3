use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

/// Single connection attempt at boot; no retry policy.
pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connect to database")?;
    tracing::info!("database connected");
    Ok(db)
}

pub async fn migrate(db: &PgPool) {
    if let Err(e) = sqlx::migrate!("./migrations").run(db).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }
}
