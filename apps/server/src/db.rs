use sqlx::SqlitePool;

use crate::models::AdminSettings;

pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    // Enable WAL mode for better concurrent access
    sqlx::query("PRAGMA journal_mode=WAL")
        .execute(pool)
        .await?;

    // Create migrations tracking table
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .execute(pool)
    .await?;

    let applied: bool =
        sqlx::query_scalar("SELECT COUNT(*) > 0 FROM _migrations WHERE name = '001_init'")
            .fetch_one(pool)
            .await?;

    if !applied {
        let migration_sql = include_str!("../migrations/001_init.sql");
        for statement in migration_sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed).execute(pool).await?;
            }
        }
        sqlx::query("INSERT INTO _migrations (name) VALUES ('001_init')")
            .execute(pool)
            .await?;
        tracing::info!("Applied migration: 001_init");
    }

    tracing::info!("Database migrations up to date");
    Ok(())
}

/// Load the settings singleton (seeded by 001_init, id is always 1).
pub async fn load_settings(pool: &SqlitePool) -> Result<AdminSettings, sqlx::Error> {
    sqlx::query_as::<_, AdminSettings>(
        "SELECT id, early_booking_restriction, early_booking_hours, restricted_hours,
                multiple_barbers_enabled, default_barber_id, reviews_enabled
         FROM admin_settings WHERE id = 1",
    )
    .fetch_one(pool)
    .await
}
