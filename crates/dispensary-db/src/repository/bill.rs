//! # Bill Repository
//!
//! Purchase bills are written twice: once to the primary store
//! (`purchase_bills` / `purchase_bill_items`, medicines by id) and once to the
//! legacy report store (`bills` / `bill_particulars`, medicines by name).
//! A bill number taken in either store is taken.
//!
//! ## Bill Write Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  number_exists(B1)?  primary OR legacy ── yes ──► DuplicateBill        │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  insert_bill        purchase_bills   (B1, 2024-01-10, ...)             │
//! │  insert_legacy_bill bills            (B1, 2024-01-10, ...)             │
//! │       │                                                                 │
//! │       ▼  per line, in list order                                       │
//! │  insert_item        purchase_bill_items (line_no, medicine_id, q, p)   │
//! │  insert_particular  bill_particulars    (medicine_name, q, p)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use dispensary_core::{BillHeader, PurchaseBill, PurchaseBillItem};

/// Repository for purchase bills.
#[derive(Debug, Clone)]
pub struct BillRepository {
    pool: SqlitePool,
}

impl BillRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BillRepository { pool }
    }

    // =========================================================================
    // Read Side
    // =========================================================================

    pub async fn get_by_number(&self, bill_number: &str) -> DbResult<Option<PurchaseBill>> {
        let bill = sqlx::query_as::<_, PurchaseBill>(
            r#"
            SELECT id, bill_number, purchase_date, enterprise_name, grand_total_paise, created_at
            FROM purchase_bills
            WHERE bill_number = ?1
            "#,
        )
        .bind(bill_number.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(bill)
    }

    /// Items of one bill in line order.
    pub async fn get_items(&self, bill_id: &str) -> DbResult<Vec<PurchaseBillItem>> {
        let items = sqlx::query_as::<_, PurchaseBillItem>(
            r#"
            SELECT id, purchase_bill_id, line_no, medicine_id, quantity, price_per_unit_paise
            FROM purchase_bill_items
            WHERE purchase_bill_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(bill_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Bills dated within `[from, to]`, oldest first.
    pub async fn bills_between(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<PurchaseBill>> {
        let bills = sqlx::query_as::<_, PurchaseBill>(
            r#"
            SELECT id, bill_number, purchase_date, enterprise_name, grand_total_paise, created_at
            FROM purchase_bills
            WHERE purchase_date BETWEEN ?1 AND ?2
            ORDER BY purchase_date, created_at
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(bills)
    }

    /// Counts bills in the primary and legacy stores (for diagnostics).
    pub async fn count(&self) -> DbResult<(i64, i64)> {
        let counts: (i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM purchase_bills), (SELECT COUNT(*) FROM bills)",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(counts)
    }

    // =========================================================================
    // Write Side (inside a ledger transaction)
    // =========================================================================

    /// Whether `bill_number` is used in the primary or the legacy store.
    pub async fn number_exists(conn: &mut SqliteConnection, bill_number: &str) -> DbResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT
                EXISTS(SELECT 1 FROM purchase_bills WHERE bill_number = ?1)
                OR EXISTS(SELECT 1 FROM bills WHERE bill_no = ?1)
            "#,
        )
        .bind(bill_number)
        .fetch_one(conn)
        .await?;

        Ok(exists)
    }

    /// Writes the bill header to both stores.
    pub async fn insert_bill(conn: &mut SqliteConnection, header: &BillHeader) -> DbResult<PurchaseBill> {
        let bill = PurchaseBill {
            id: Uuid::new_v4().to_string(),
            bill_number: header.bill_number.trim().to_string(),
            purchase_date: header.purchase_date,
            enterprise_name: header.enterprise_name.clone(),
            grand_total_paise: header.grand_total.paise(),
            created_at: Utc::now(),
        };

        debug!(id = %bill.id, bill_number = %bill.bill_number, "Inserting purchase bill");

        sqlx::query(
            r#"
            INSERT INTO purchase_bills (
                id, bill_number, purchase_date, enterprise_name, grand_total_paise, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&bill.id)
        .bind(&bill.bill_number)
        .bind(bill.purchase_date)
        .bind(&bill.enterprise_name)
        .bind(bill.grand_total_paise)
        .bind(bill.created_at)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO bills (bill_no, bill_date, grand_total_paise, enterprise_name)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&bill.bill_number)
        .bind(bill.purchase_date)
        .bind(bill.grand_total_paise)
        .bind(&bill.enterprise_name)
        .execute(conn)
        .await?;

        Ok(bill)
    }

    /// Appends one line to both stores.
    pub async fn insert_item(
        conn: &mut SqliteConnection,
        bill: &PurchaseBill,
        line_no: i64,
        medicine_id: &str,
        medicine_name: &str,
        quantity: i64,
        price_per_unit_paise: i64,
    ) -> DbResult<PurchaseBillItem> {
        let item = PurchaseBillItem {
            id: Uuid::new_v4().to_string(),
            purchase_bill_id: bill.id.clone(),
            line_no,
            medicine_id: medicine_id.to_string(),
            quantity,
            price_per_unit_paise,
        };

        sqlx::query(
            r#"
            INSERT INTO purchase_bill_items (
                id, purchase_bill_id, line_no, medicine_id, quantity, price_per_unit_paise
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&item.id)
        .bind(&item.purchase_bill_id)
        .bind(item.line_no)
        .bind(&item.medicine_id)
        .bind(item.quantity)
        .bind(item.price_per_unit_paise)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO bill_particulars (bill_no, medicine_name, quantity, price_per_unit_paise)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&bill.bill_number)
        .bind(medicine_name)
        .bind(quantity)
        .bind(price_per_unit_paise)
        .execute(conn)
        .await?;

        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use dispensary_core::Money;

    #[tokio::test]
    async fn test_number_checked_in_both_stores() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        assert!(!BillRepository::number_exists(&mut conn, "B1").await.unwrap());

        sqlx::query("INSERT INTO bills (bill_no, bill_date, grand_total_paise) VALUES ('LEGACY-9', '2023-06-01', 100)")
            .execute(&mut *conn)
            .await
            .unwrap();
        assert!(BillRepository::number_exists(&mut conn, "LEGACY-9").await.unwrap());

        let header = BillHeader {
            bill_number: "B1".to_string(),
            purchase_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            enterprise_name: Some("City Pharma".to_string()),
            grand_total: Money::from_paise(20_000),
        };
        BillRepository::insert_bill(&mut conn, &header).await.unwrap();
        assert!(BillRepository::number_exists(&mut conn, "B1").await.unwrap());
        drop(conn);

        assert_eq!(db.bills().count().await.unwrap(), (1, 2));
        let bill = db.bills().get_by_number("B1").await.unwrap().unwrap();
        assert_eq!(bill.grand_total_paise, 20_000);
    }
}
