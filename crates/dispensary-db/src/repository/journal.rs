//! # Journal Repository
//!
//! Persistence for the daily stock journal: one row per `(medicine, date)`,
//! created on first touch and updated incrementally afterwards. Rows are
//! never deleted (a trigger enforces it).
//!
//! The arithmetic lives in [`dispensary_core::journal`]; this module decides
//! which row to touch and where a new row's opening comes from.

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use dispensary_core::{JournalEntry, StockJournalRow};

const JOURNAL_COLUMNS: &str =
    "medicine_name, journal_date, opening_stock, stock_in, stock_out, closing_stock";

/// Repository for the daily stock journal.
#[derive(Debug, Clone)]
pub struct JournalRepository {
    pool: SqlitePool,
}

impl JournalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        JournalRepository { pool }
    }

    // =========================================================================
    // Read Side
    // =========================================================================

    /// The row for `(medicine, date)`, if that day was touched.
    pub async fn get(&self, medicine_name: &str, date: NaiveDate) -> DbResult<Option<StockJournalRow>> {
        let row = sqlx::query_as::<_, StockJournalRow>(&format!(
            "SELECT {JOURNAL_COLUMNS} FROM daily_stock_journal \
             WHERE medicine_name = ?1 AND journal_date = ?2"
        ))
        .bind(medicine_name.trim())
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Every row of one medicine, oldest first.
    pub async fn history(&self, medicine_name: &str) -> DbResult<Vec<StockJournalRow>> {
        let rows = sqlx::query_as::<_, StockJournalRow>(&format!(
            "SELECT {JOURNAL_COLUMNS} FROM daily_stock_journal \
             WHERE medicine_name = ?1 ORDER BY journal_date"
        ))
        .bind(medicine_name.trim())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// All rows dated within `[from, to]`, by medicine then date.
    pub async fn rows_between(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<StockJournalRow>> {
        let rows = sqlx::query_as::<_, StockJournalRow>(&format!(
            "SELECT {JOURNAL_COLUMNS} FROM daily_stock_journal \
             WHERE journal_date BETWEEN ?1 AND ?2 \
             ORDER BY medicine_name COLLATE NOCASE, journal_date"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Latest recorded closing strictly before `date`, per medicine.
    ///
    /// Medicines with no earlier row are absent from the result.
    pub async fn closings_before(&self, date: NaiveDate) -> DbResult<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT j.medicine_name, j.closing_stock
            FROM daily_stock_journal j
            WHERE j.journal_date = (
                SELECT MAX(p.journal_date)
                FROM daily_stock_journal p
                WHERE p.medicine_name = j.medicine_name
                  AND p.journal_date < ?1
            )
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // =========================================================================
    // Write Side (inside a ledger transaction)
    // =========================================================================

    pub async fn find(
        conn: &mut SqliteConnection,
        medicine_name: &str,
        date: NaiveDate,
    ) -> DbResult<Option<JournalEntry>> {
        let entry = sqlx::query_as::<_, JournalEntry>(
            r#"
            SELECT opening_stock, stock_in, stock_out, closing_stock
            FROM daily_stock_journal
            WHERE medicine_name = ?1 AND journal_date = ?2
            "#,
        )
        .bind(medicine_name)
        .bind(date)
        .fetch_optional(conn)
        .await?;

        Ok(entry)
    }

    /// Closing of the latest row strictly before `date`, walking back over
    /// days with no row.
    pub async fn latest_closing_before(
        conn: &mut SqliteConnection,
        medicine_name: &str,
        date: NaiveDate,
    ) -> DbResult<Option<i64>> {
        let closing: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT closing_stock
            FROM daily_stock_journal
            WHERE medicine_name = ?1 AND journal_date < ?2
            ORDER BY journal_date DESC
            LIMIT 1
            "#,
        )
        .bind(medicine_name)
        .bind(date)
        .fetch_optional(conn)
        .await?;

        Ok(closing)
    }

    /// Records `quantity` units in for `(medicine, date)`.
    ///
    /// A first touch opens at the latest prior closing, or 0.
    pub async fn record_in(
        conn: &mut SqliteConnection,
        medicine_name: &str,
        date: NaiveDate,
        quantity: i64,
    ) -> DbResult<JournalEntry> {
        match Self::find(&mut *conn, medicine_name, date).await? {
            Some(mut entry) => {
                entry.record_in(quantity);
                Self::update(conn, medicine_name, date, &entry).await?;
                Ok(entry)
            }
            None => {
                let prior = Self::latest_closing_before(&mut *conn, medicine_name, date).await?;
                let mut entry = JournalEntry::opened_with(JournalEntry::opening_for_in(prior));
                entry.record_in(quantity);
                Self::insert(conn, medicine_name, date, &entry).await?;
                Ok(entry)
            }
        }
    }

    /// Records `quantity` units out for `(medicine, date)`.
    ///
    /// A first touch opens at the latest prior closing; a medicine with no
    /// journal history opens at `catalog_stock_before`, the catalog count
    /// before this decrement.
    pub async fn record_out(
        conn: &mut SqliteConnection,
        medicine_name: &str,
        date: NaiveDate,
        quantity: i64,
        catalog_stock_before: i64,
    ) -> DbResult<JournalEntry> {
        match Self::find(&mut *conn, medicine_name, date).await? {
            Some(mut entry) => {
                entry.record_out(quantity);
                Self::update(conn, medicine_name, date, &entry).await?;
                Ok(entry)
            }
            None => {
                let prior = Self::latest_closing_before(&mut *conn, medicine_name, date).await?;
                let opening = JournalEntry::opening_for_out(prior, catalog_stock_before);
                let mut entry = JournalEntry::opened_with(opening);
                entry.record_out(quantity);
                Self::insert(conn, medicine_name, date, &entry).await?;
                Ok(entry)
            }
        }
    }

    async fn insert(
        conn: &mut SqliteConnection,
        medicine_name: &str,
        date: NaiveDate,
        entry: &JournalEntry,
    ) -> DbResult<()> {
        debug!(medicine = %medicine_name, %date, opening = entry.opening_stock, "Opening journal row");

        sqlx::query(
            r#"
            INSERT INTO daily_stock_journal
                (medicine_name, journal_date, opening_stock, stock_in, stock_out, closing_stock)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(medicine_name)
        .bind(date)
        .bind(entry.opening_stock)
        .bind(entry.stock_in)
        .bind(entry.stock_out)
        .bind(entry.closing_stock)
        .execute(conn)
        .await?;

        Ok(())
    }

    async fn update(
        conn: &mut SqliteConnection,
        medicine_name: &str,
        date: NaiveDate,
        entry: &JournalEntry,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE daily_stock_journal
            SET stock_in = ?3, stock_out = ?4, closing_stock = ?5
            WHERE medicine_name = ?1 AND journal_date = ?2
            "#,
        )
        .bind(medicine_name)
        .bind(date)
        .bind(entry.stock_in)
        .bind(entry.stock_out)
        .bind(entry.closing_stock)
        .execute(conn)
        .await?;

        Ok(())
    }
}
