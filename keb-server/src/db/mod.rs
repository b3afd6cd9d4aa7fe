use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect to the broker database and make sure the `keb` schema is in place.
pub async fn connect(db_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(db_url)
        .await
        .context("Failed to connect to database")?;

    keb_orchestrations::storage::initialize_schema(&pool)
        .await
        .context("Failed to initialize keb schema")?;
    verify_tables(&pool).await?;

    Ok(pool)
}

/// Verify that the broker tables exist
async fn verify_tables(pool: &PgPool) -> Result<()> {
    for table in ["instances", "operations", "hyperscaler_credentials"] {
        let result: Option<(bool,)> = sqlx::query_as(
            "SELECT EXISTS (
                SELECT FROM information_schema.tables
                WHERE table_schema = 'keb'
                AND table_name = $1
            )",
        )
        .bind(table)
        .fetch_optional(pool)
        .await
        .context("Failed to check if broker tables exist")?;

        if !matches!(result, Some((true,))) {
            anyhow::bail!("Table keb.{} not found after schema initialization", table);
        }
    }

    tracing::info!("✓ Broker tables verified");
    Ok(())
}
