//! # Medicine Repository
//!
//! The medicine catalog: authoritative current stock and price per medicine.
//!
//! ## Key Operations
//! - Case-insensitive lookup and find-or-create (purchase path)
//! - Stock deltas applied in SQL
//! - Reference-checked removal
//! - Immutable administrative adjustment events
//!
//! ## Two Reference Styles
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Who points at a medicine?                              │
//! │                                                                         │
//! │  purchase_bill_items.medicine_id    ──► medicines.id                   │
//! │  stock_adjustments.medicine_id      ──► medicines.id                   │
//! │  bill_particulars.medicine_name     ──► medicines.name (NOCASE)        │
//! │  prescribed_medicines.medicine_name ──► medicines.name (NOCASE)        │
//! │                                                                         │
//! │  remove() counts all four before deleting anything                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use dispensary_core::{CoreError, Medicine, Money, StockAdjustment};

const MEDICINE_COLUMNS: &str = "id, name, stock, price_per_unit_paise, last_updated";

/// Rows that reference one medicine, by table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MedicineReferences {
    pub purchase_items: i64,
    pub bill_particulars: i64,
    pub prescriptions: i64,
    pub adjustments: i64,
}

impl MedicineReferences {
    pub fn is_referenced(&self) -> bool {
        self.purchase_items + self.bill_particulars + self.prescriptions + self.adjustments > 0
    }
}

/// Repository for the medicine catalog.
///
/// ## Usage
/// ```rust,ignore
/// let meds = db.medicines();
/// let para = meds.get_by_name("paracetamol").await?; // matches "Paracetamol"
/// let all = meds.list().await?;
/// ```
#[derive(Debug, Clone)]
pub struct MedicineRepository {
    pool: SqlitePool,
}

impl MedicineRepository {
    /// Creates a new MedicineRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MedicineRepository { pool }
    }

    // =========================================================================
    // Read Side
    // =========================================================================

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Medicine>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_by_id(&mut conn, id).await
    }

    /// Case-insensitive name lookup (the autocomplete resolver).
    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Medicine>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_by_name(&mut conn, name).await
    }

    /// All medicines ordered by name.
    pub async fn list(&self) -> DbResult<Vec<Medicine>> {
        let medicines = sqlx::query_as::<_, Medicine>(&format!(
            "SELECT {MEDICINE_COLUMNS} FROM medicines ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(medicines)
    }

    /// Administrative adjustments for one medicine, oldest first.
    pub async fn adjustments(&self, medicine_id: &str) -> DbResult<Vec<StockAdjustment>> {
        let rows = sqlx::query_as::<_, StockAdjustment>(
            r#"
            SELECT id, medicine_id, adjustment_date, delta, reason, created_at
            FROM stock_adjustments
            WHERE medicine_id = ?1
            ORDER BY adjustment_date, created_at
            "#,
        )
        .bind(medicine_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Counts total medicines (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM medicines")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Write Side (inside a ledger transaction)
    // =========================================================================

    pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Medicine>> {
        let medicine = sqlx::query_as::<_, Medicine>(&format!(
            "SELECT {MEDICINE_COLUMNS} FROM medicines WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(medicine)
    }

    pub async fn find_by_name(
        conn: &mut SqliteConnection,
        name: &str,
    ) -> DbResult<Option<Medicine>> {
        // `name` is declared COLLATE NOCASE, so `=` is case-insensitive
        let medicine = sqlx::query_as::<_, Medicine>(&format!(
            "SELECT {MEDICINE_COLUMNS} FROM medicines WHERE name = ?1"
        ))
        .bind(name.trim())
        .fetch_optional(conn)
        .await?;

        Ok(medicine)
    }

    /// Inserts a new catalog row. Fails with `MedicineExists` when the name
    /// is taken, ignoring case.
    pub async fn insert(
        conn: &mut SqliteConnection,
        name: &str,
        stock: i64,
        price: Option<Money>,
        date: NaiveDate,
    ) -> DbResult<Medicine> {
        let name = name.trim();

        if Self::find_by_name(&mut *conn, name).await?.is_some() {
            return Err(CoreError::MedicineExists(name.to_string()).into());
        }

        let medicine = Medicine {
            id: generate_medicine_id(),
            name: name.to_string(),
            stock,
            price_per_unit_paise: price.map(|p| p.paise()),
            last_updated: date,
        };

        debug!(id = %medicine.id, medicine = %medicine.name, stock, "Inserting medicine");

        sqlx::query(
            r#"
            INSERT INTO medicines (id, name, stock, price_per_unit_paise, last_updated)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&medicine.id)
        .bind(&medicine.name)
        .bind(medicine.stock)
        .bind(medicine.price_per_unit_paise)
        .bind(medicine.last_updated)
        .execute(conn)
        .await?;

        Ok(medicine)
    }

    /// Case-insensitive lookup; creates the medicine on a miss with
    /// `initial_stock` as its starting value.
    pub async fn find_or_create(
        conn: &mut SqliteConnection,
        name: &str,
        initial_stock: i64,
        price: Option<Money>,
        date: NaiveDate,
    ) -> DbResult<Medicine> {
        if let Some(existing) = Self::find_by_name(&mut *conn, name).await? {
            return Ok(existing);
        }

        Self::insert(conn, name, initial_stock, price, date).await
    }

    /// Applies `stock += delta`, stamps `last_updated`, and overwrites the
    /// price when one is given.
    ///
    /// ## Concurrency
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  The delta is applied in SQL, never as "read, add, write back".    │
    /// │                                                                     │
    /// │  Submission A: stock = stock - 10                                  │
    /// │  Submission B: stock = stock + 100                                 │
    /// │  Writers are serialized by BEGIN IMMEDIATE, and neither update     │
    /// │  depends on a value read earlier, so none can be lost.             │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    pub async fn adjust_stock(
        conn: &mut SqliteConnection,
        id: &str,
        delta: i64,
        new_price: Option<Money>,
        date: NaiveDate,
    ) -> DbResult<Medicine> {
        debug!(id = %id, delta, "Adjusting stock");

        let medicine = sqlx::query_as::<_, Medicine>(&format!(
            r#"
            UPDATE medicines
            SET
                stock = stock + ?2,
                price_per_unit_paise = COALESCE(?3, price_per_unit_paise),
                last_updated = ?4
            WHERE id = ?1
            RETURNING {MEDICINE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(delta)
        .bind(new_price.map(|p| p.paise()))
        .bind(date)
        .fetch_optional(conn)
        .await?;

        medicine.ok_or_else(|| DbError::not_found("Medicine", id))
    }

    /// Counts every row that references `medicine`, by id or by name.
    pub async fn references(
        conn: &mut SqliteConnection,
        medicine: &Medicine,
    ) -> DbResult<MedicineReferences> {
        let (purchase_items, bill_particulars, prescriptions, adjustments): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM purchase_bill_items WHERE medicine_id = ?1),
                    (SELECT COUNT(*) FROM bill_particulars WHERE medicine_name = ?2),
                    (SELECT COUNT(*) FROM prescribed_medicines WHERE medicine_name = ?2),
                    (SELECT COUNT(*) FROM stock_adjustments WHERE medicine_id = ?1)
                "#,
            )
            .bind(&medicine.id)
            .bind(&medicine.name)
            .fetch_one(conn)
            .await?;

        Ok(MedicineReferences {
            purchase_items,
            bill_particulars,
            prescriptions,
            adjustments,
        })
    }

    /// Deletes a medicine that nothing references.
    ///
    /// Fails with `MedicineNotFound` for an unknown id and with
    /// `ReferencedEntity` (carrying the per-table counts) otherwise.
    pub async fn remove(conn: &mut SqliteConnection, id: &str) -> DbResult<Medicine> {
        let medicine = Self::find_by_id(&mut *conn, id)
            .await?
            .ok_or_else(|| CoreError::MedicineNotFound(id.to_string()))?;

        let refs = Self::references(&mut *conn, &medicine).await?;
        if refs.is_referenced() {
            return Err(CoreError::ReferencedEntity {
                medicine: medicine.name,
                purchase_items: refs.purchase_items,
                bill_particulars: refs.bill_particulars,
                prescriptions: refs.prescriptions,
                adjustments: refs.adjustments,
            }
            .into());
        }

        debug!(id = %id, medicine = %medicine.name, "Deleting medicine");

        sqlx::query("DELETE FROM medicines WHERE id = ?1")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(medicine)
    }

    /// Appends an administrative adjustment event.
    pub async fn record_adjustment(
        conn: &mut SqliteConnection,
        medicine_id: &str,
        date: NaiveDate,
        delta: i64,
        reason: Option<&str>,
    ) -> DbResult<StockAdjustment> {
        let adjustment = StockAdjustment {
            id: Uuid::new_v4().to_string(),
            medicine_id: medicine_id.to_string(),
            adjustment_date: date,
            delta,
            reason: reason.map(str::to_string),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO stock_adjustments (id, medicine_id, adjustment_date, delta, reason, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&adjustment.id)
        .bind(&adjustment.medicine_id)
        .bind(adjustment.adjustment_date)
        .bind(adjustment.delta)
        .bind(&adjustment.reason)
        .bind(adjustment.created_at)
        .execute(conn)
        .await?;

        Ok(adjustment)
    }
}

/// Helper to generate a new medicine ID.
pub fn generate_medicine_id() -> String {
    Uuid::new_v4().to_string()
}
