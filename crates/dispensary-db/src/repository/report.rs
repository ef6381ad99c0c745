//! # Report Repository
//!
//! Stock movement over a date range, two ways, and the checks that compare
//! them.
//!
//! ## Read Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Where the numbers come from                          │
//! │                                                                         │
//! │  stock_movement(from, to)      ◄── event log (authoritative)           │
//! │    purchase_bill_items ─┐                                               │
//! │    prescribed_medicines ├─► EVENTS ─► opening / in / out / closing     │
//! │    stock_adjustments ───┘                                               │
//! │                                                                         │
//! │  journal_movement(from, to)    ◄── daily_stock_journal                 │
//! │    latest closing before `from` + rows in [from, to] ─► summarize()    │
//! │                                                                         │
//! │  journal_drift(from, to)   event log vs journal, per medicine          │
//! │  catalog_drift()           medicines.stock vs all-time event sum       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Event-Log Formula
//! - opening = Σ in dated `<= from` − Σ out dated `< from`
//! - in, out = Σ within `[from, to]`
//! - closing = Σ in − Σ out, dated `<= to`
//!
//! Stock that arrives on `from` therefore counts in both the opening and the
//! period's stock-in. The journal path opens before any of that day's
//! movement, so the drift check leaves the opening column out.
//!
//! Nothing here takes a write lock. A report may land between two
//! submissions; it is advisory.

use chrono::NaiveDate;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::DbResult;
use crate::repository::journal::JournalRepository;
use dispensary_core::journal::summarize;
use dispensary_core::validation::validate_date_range;
use dispensary_core::{JournalEntry, MovementDrift, PurchaseReportLine, StockDrift, StockMovement};

/// Every stock event as `(medicine_id, event_date, qty_in, qty_out)`.
///
/// Prescriptions carry a name, so they resolve to the catalog row by name.
const EVENTS_CTE: &str = r#"
WITH events AS (
    SELECT pbi.medicine_id AS medicine_id,
           pb.purchase_date AS event_date,
           pbi.quantity AS qty_in,
           0 AS qty_out
    FROM purchase_bill_items pbi
    JOIN purchase_bills pb ON pb.id = pbi.purchase_bill_id

    UNION ALL

    SELECT m.id, v.visit_date, 0, pm.quantity
    FROM prescribed_medicines pm
    JOIN visits v ON v.id = pm.visit_id
    JOIN medicines m ON m.name = pm.medicine_name

    UNION ALL

    SELECT sa.medicine_id, sa.adjustment_date, MAX(sa.delta, 0), MAX(-sa.delta, 0)
    FROM stock_adjustments sa
)
"#;

/// Repository for stock reports and reconciliation.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Opening/in/out/closing for every medicine over `[from, to]`, recomputed
    /// from the event log. Medicines with no events report zeros.
    pub async fn stock_movement(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<StockMovement>> {
        validate_date_range(from, to)?;
        debug!(%from, %to, "Computing stock movement from event log");

        let sql = format!(
            r#"{EVENTS_CTE}
            SELECT
                m.id AS medicine_id,
                m.name AS medicine_name,
                COALESCE(SUM(CASE WHEN e.event_date <= ?1 THEN e.qty_in ELSE 0 END), 0)
                  - COALESCE(SUM(CASE WHEN e.event_date < ?1 THEN e.qty_out ELSE 0 END), 0)
                    AS opening_stock,
                COALESCE(SUM(CASE WHEN e.event_date BETWEEN ?1 AND ?2 THEN e.qty_in ELSE 0 END), 0)
                    AS stock_in,
                COALESCE(SUM(CASE WHEN e.event_date BETWEEN ?1 AND ?2 THEN e.qty_out ELSE 0 END), 0)
                    AS stock_out,
                COALESCE(SUM(CASE WHEN e.event_date <= ?2 THEN e.qty_in - e.qty_out ELSE 0 END), 0)
                    AS closing_stock
            FROM medicines m
            LEFT JOIN events e ON e.medicine_id = m.id
            GROUP BY m.id, m.name
            ORDER BY m.name
            "#
        );

        let rows = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// The same report built from the daily stock journal.
    ///
    /// For each medicine the period opens at its first row in range, or at
    /// the latest closing before `from` when the range has no row; days
    /// without a row contribute no movement.
    pub async fn journal_movement(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<StockMovement>> {
        validate_date_range(from, to)?;
        debug!(%from, %to, "Computing stock movement from journal");

        let medicines: Vec<(String, String)> =
            sqlx::query_as("SELECT id, name FROM medicines ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        let journal = JournalRepository::new(self.pool.clone());

        let prior: HashMap<String, i64> = journal
            .closings_before(from)
            .await?
            .into_iter()
            .map(|(name, closing)| (name.to_lowercase(), closing))
            .collect();

        let mut days: HashMap<String, Vec<JournalEntry>> = HashMap::new();
        for row in journal.rows_between(from, to).await? {
            days.entry(row.medicine_name.to_lowercase())
                .or_default()
                .push(row.entry);
        }

        let movements = medicines
            .into_iter()
            .map(|(medicine_id, medicine_name)| {
                let key = medicine_name.to_lowercase();
                let period = summarize(
                    prior.get(&key).copied(),
                    days.get(&key).map(Vec::as_slice).unwrap_or(&[]),
                );
                StockMovement {
                    medicine_id,
                    medicine_name,
                    opening_stock: period.opening_stock,
                    stock_in: period.stock_in,
                    stock_out: period.stock_out,
                    closing_stock: period.closing_stock,
                }
            })
            .collect();

        Ok(movements)
    }

    /// Medicines whose journal disagrees with the event log on stock-in,
    /// stock-out, or closing over `[from, to]`.
    pub async fn journal_drift(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<MovementDrift>> {
        let from_events = self.stock_movement(from, to).await?;
        let mut from_journal: HashMap<String, StockMovement> = self
            .journal_movement(from, to)
            .await?
            .into_iter()
            .map(|m| (m.medicine_id.clone(), m))
            .collect();

        let mut drift = Vec::new();
        for event_log in from_events {
            let Some(journal) = from_journal.remove(&event_log.medicine_id) else {
                continue;
            };

            if event_log.stock_in != journal.stock_in
                || event_log.stock_out != journal.stock_out
                || event_log.closing_stock != journal.closing_stock
            {
                warn!(
                    medicine = %event_log.medicine_name,
                    events_closing = event_log.closing_stock,
                    journal_closing = journal.closing_stock,
                    "Journal drift detected"
                );
                drift.push(MovementDrift {
                    medicine_name: event_log.medicine_name.clone(),
                    event_log,
                    journal,
                });
            }
        }

        Ok(drift)
    }

    /// Medicines whose catalog stock differs from the all-time sum of their
    /// events.
    pub async fn catalog_drift(&self) -> DbResult<Vec<StockDrift>> {
        let sql = format!(
            r#"{EVENTS_CTE}
            SELECT medicine_id, medicine_name, catalog_stock, event_stock
            FROM (
                SELECT
                    m.id AS medicine_id,
                    m.name AS medicine_name,
                    m.stock AS catalog_stock,
                    COALESCE(SUM(e.qty_in - e.qty_out), 0) AS event_stock
                FROM medicines m
                LEFT JOIN events e ON e.medicine_id = m.id
                GROUP BY m.id, m.name, m.stock
            )
            WHERE catalog_stock <> event_stock
            ORDER BY medicine_name
            "#
        );

        let rows = sqlx::query_as::<_, StockDrift>(&sql)
            .fetch_all(&self.pool)
            .await?;

        for row in &rows {
            warn!(
                medicine = %row.medicine_name,
                catalog = row.catalog_stock,
                events = row.event_stock,
                "Catalog stock drift detected"
            );
        }

        Ok(rows)
    }

    /// Legacy bills joined with their particulars over `[from, to]`, for the
    /// purchase register export.
    pub async fn purchase_report(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<PurchaseReportLine>> {
        validate_date_range(from, to)?;

        let rows = sqlx::query_as::<_, PurchaseReportLine>(
            r#"
            SELECT
                b.bill_no,
                b.bill_date,
                b.enterprise_name,
                b.grand_total_paise,
                bp.medicine_name,
                bp.quantity,
                bp.price_per_unit_paise,
                bp.quantity * bp.price_per_unit_paise AS line_total_paise
            FROM bills b
            JOIN bill_particulars bp ON bp.bill_no = b.bill_no
            WHERE b.bill_date BETWEEN ?1 AND ?2
            ORDER BY b.bill_date, b.bill_no, bp.id
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
