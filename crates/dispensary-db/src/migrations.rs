//! # Schema Migrations
//!
//! The schema ships inside the binary. `Database::new` brings any database
//! file up to date before handing out repositories.
//!
//! ```text
//! migrations/sqlite/
//!   001_initial_schema.sql   catalog, journal, summaries, bills, visits,
//!                            patients, append-only triggers
//! ```
//!
//! Applied versions are tracked in `_sqlx_migrations`. A shipped file is
//! never edited; schema changes go in a new `NNN_*.sql` file.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Embedded migrations from the workspace `migrations/sqlite` directory.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies whatever the database has not seen yet. Each file runs in its
/// own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!(known = MIGRATOR.migrations.len(), "Applying schema migrations");

    MIGRATOR.run(pool).await?;

    info!("Schema up to date");
    Ok(())
}

/// `(embedded, applied)` migration counts.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await?;

    Ok((total, applied as usize))
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};

    use super::*;

    #[tokio::test]
    async fn test_all_migrations_applied() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (total, applied) = migration_status(db.pool()).await.unwrap();
        assert!(total >= 1);
        assert_eq!(total, applied);

        // Re-running is a no-op
        db.run_migrations().await.unwrap();
    }

    #[tokio::test]
    async fn test_event_rows_are_append_only() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let pool = db.pool();

        sqlx::query("INSERT INTO bills (bill_no, bill_date, grand_total_paise) VALUES ('L1', '2024-01-01', 0)")
            .execute(pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO bill_particulars (bill_no, medicine_name, quantity, price_per_unit_paise) \
             VALUES ('L1', 'Paracetamol', 5, 100)",
        )
        .execute(pool)
        .await
        .unwrap();

        let err = sqlx::query("UPDATE bill_particulars SET quantity = 50")
            .execute(pool)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("append-only"));

        let err = sqlx::query("DELETE FROM bill_particulars")
            .execute(pool)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("append-only"));
    }

    #[tokio::test]
    async fn test_journal_balance_check() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let result = sqlx::query(
            "INSERT INTO daily_stock_journal \
             (medicine_name, journal_date, opening_stock, stock_in, stock_out, closing_stock) \
             VALUES ('Paracetamol', '2024-01-10', 0, 100, 0, 90)",
        )
        .execute(db.pool())
        .await;
        assert!(result.is_err());
    }
}
