//! # Summary Repository
//!
//! Per-date visit counters by category, plus the same-day guard.
//!
//! ## Register Visit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  register_visit(2024-01-11, MaleStudent, "21CS01")                      │
//! │                                                                         │
//! │  1. (date, regno) in daily_summary_regnos?  ── yes ──► DuplicateVisit  │
//! │  2. daily_summary row for date? ── no ──► create with zero counters    │
//! │  3. male_student += 1, total_entries += 1                              │
//! │  4. guard += (date, regno, position = total_entries)                   │
//! │                                                                         │
//! │  Steps 2-4 run inside the caller's transaction, so they land together  │
//! │  or not at all. The guard's primary key backs up step 1.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use dispensary_core::{CoreError, DailySummary, VisitCategory};

const SUMMARY_COLUMNS: &str =
    "summary_date, male_student, female_student, male_staff, female_staff, total_entries";

/// Repository for daily visit summaries.
#[derive(Debug, Clone)]
pub struct SummaryRepository {
    pool: SqlitePool,
}

impl SummaryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SummaryRepository { pool }
    }

    /// The summary for one date, with its guard list.
    pub async fn get(&self, date: NaiveDate) -> DbResult<Option<DailySummary>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, date).await
    }

    /// Summaries for every visited date in `[from, to]`, oldest first.
    pub async fn summaries_between(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<DailySummary>> {
        let mut summaries = sqlx::query_as::<_, DailySummary>(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM daily_summary \
             WHERE summary_date BETWEEN ?1 AND ?2 ORDER BY summary_date"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let guards: Vec<(NaiveDate, String)> = sqlx::query_as(
            r#"
            SELECT summary_date, regno
            FROM daily_summary_regnos
            WHERE summary_date BETWEEN ?1 AND ?2
            ORDER BY summary_date, position
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        for (date, regno) in guards {
            if let Some(summary) = summaries.iter_mut().find(|s| s.summary_date == date) {
                summary.regnos.push(regno);
            }
        }

        Ok(summaries)
    }

    // =========================================================================
    // Write Side (inside a ledger transaction)
    // =========================================================================

    pub async fn find(conn: &mut SqliteConnection, date: NaiveDate) -> DbResult<Option<DailySummary>> {
        let summary = sqlx::query_as::<_, DailySummary>(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM daily_summary WHERE summary_date = ?1"
        ))
        .bind(date)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(mut summary) = summary else {
            return Ok(None);
        };

        summary.regnos = sqlx::query_scalar(
            "SELECT regno FROM daily_summary_regnos WHERE summary_date = ?1 ORDER BY position",
        )
        .bind(date)
        .fetch_all(conn)
        .await?;

        Ok(Some(summary))
    }

    /// Whether `regno` was already registered on `date`.
    pub async fn is_registered(conn: &mut SqliteConnection, date: NaiveDate, regno: &str) -> DbResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM daily_summary_regnos WHERE summary_date = ?1 AND regno = ?2)",
        )
        .bind(date)
        .bind(regno)
        .fetch_one(conn)
        .await?;

        Ok(exists)
    }

    /// Counts one visit for `category` on `date` and adds `regno` to the
    /// guard. Fails with `DuplicateVisit` if `regno` is already there.
    pub async fn register_visit(
        conn: &mut SqliteConnection,
        date: NaiveDate,
        category: VisitCategory,
        regno: &str,
    ) -> DbResult<DailySummary> {
        if Self::is_registered(&mut *conn, date, regno).await? {
            return Err(CoreError::DuplicateVisit {
                regno: regno.to_string(),
                date,
            }
            .into());
        }

        sqlx::query("INSERT INTO daily_summary (summary_date) VALUES (?1) ON CONFLICT (summary_date) DO NOTHING")
            .bind(date)
            .execute(&mut *conn)
            .await?;

        // column() is one of four fixed identifiers
        let column = category.column();
        let total: i64 = sqlx::query_scalar(&format!(
            "UPDATE daily_summary \
             SET {column} = {column} + 1, total_entries = total_entries + 1 \
             WHERE summary_date = ?1 \
             RETURNING total_entries"
        ))
        .bind(date)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query("INSERT INTO daily_summary_regnos (summary_date, regno, position) VALUES (?1, ?2, ?3)")
            .bind(date)
            .bind(regno)
            .bind(total)
            .execute(&mut *conn)
            .await?;

        debug!(%date, regno = %regno, category = %category, total, "Visit registered");

        Self::find(conn, date)
            .await?
            .ok_or_else(|| DbError::not_found("DailySummary", date.to_string()))
    }
}
