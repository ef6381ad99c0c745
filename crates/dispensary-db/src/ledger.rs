//! # Ledger Transaction Coordinator
//!
//! Every write that moves stock goes through [`Ledger`]. Each submission runs
//! in one SQLite transaction opened with `BEGIN IMMEDIATE`, so catalog,
//! journal, summary and event rows commit together or not at all.
//!
//! ## Submit Diagnosis
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  submit_diagnosis(21CS01, "fever", "viral", [Paracetamol × 10])         │
//! │                                                                         │
//! │  validate ──────────────────────────────────► ValidationError          │
//! │  BEGIN IMMEDIATE  (waits for other writers, up to busy_timeout)        │
//! │  patient lookup ────────────────────────────► PatientNotFound          │
//! │  category from gender + type ───────────────► UnknownCategory          │
//! │  register_visit(today, category, regno) ────► DuplicateVisit           │
//! │       (before any stock is touched)                                    │
//! │  insert visit                                                          │
//! │  for each line, in order:                                              │
//! │    medicine by name ────────────────────────► MedicineNotFound         │
//! │    floor check (if enforced) ───────────────► InsufficientStock        │
//! │    stock -= q, prescription row, journal out                           │
//! │  COMMIT                                                                │
//! │                                                                         │
//! │  Any error: ROLLBACK. Nothing from this submission is visible.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Submit Purchase Bill
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate ──────────────────────────────────► ValidationError          │
//! │  BEGIN IMMEDIATE                                                       │
//! │  bill number in primary or legacy store? ──► DuplicateBill             │
//! │  bill header (both stores)                                             │
//! │  for each line, in order:                                              │
//! │    find_or_create(name, 0, price)                                      │
//! │    stock += q, price = p                                               │
//! │    purchase item + legacy particular, journal in                       │
//! │  COMMIT                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Back-dated submissions update the journal row of their own date only;
//! rows of later dates keep the openings they were created with. The
//! reconciliation reports surface the difference.

use chrono::{Local, NaiveDate};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, info, warn};

use crate::config::LedgerSettings;
use crate::error::{DbError, DbResult};
use crate::repository::bill::BillRepository;
use crate::repository::journal::JournalRepository;
use crate::repository::medicine::MedicineRepository;
use crate::repository::patient::PatientRepository;
use crate::repository::summary::SummaryRepository;
use crate::repository::visit::VisitRepository;
use dispensary_core::validation::{
    validate_adjustment, validate_bill_submission, validate_diagnosis_submission, validate_id,
    validate_new_medicine,
};
use dispensary_core::{
    AdjustMedicine, BillLineTotal, BillReceipt, BillSubmission, CoreError, DiagnosisReceipt,
    DiagnosisSubmission, Medicine, Money, NewMedicine, PrescriptionLine,
};

const OPENING_STOCK_REASON: &str = "opening stock";

/// The Ledger Transaction Coordinator.
///
/// ## Usage
/// ```rust,ignore
/// let ledger = db.ledger();
///
/// let receipt = ledger.submit_purchase_bill(&bill).await?;
/// let visit = ledger.submit_diagnosis(&diagnosis).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Ledger {
    pool: SqlitePool,
    settings: LedgerSettings,
}

impl Ledger {
    pub fn new(pool: SqlitePool, settings: LedgerSettings) -> Self {
        Ledger { pool, settings }
    }

    /// Behaviour switches this ledger was opened with.
    pub fn settings(&self) -> LedgerSettings {
        self.settings
    }

    /// Opens a write transaction holding SQLite's write lock from the first
    /// statement on.
    async fn begin_write(&self) -> DbResult<Transaction<'static, Sqlite>> {
        self.pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::PoolExhausted => DbError::PoolExhausted,
                other => DbError::TransactionFailed(other.to_string()),
            })
    }

    /// Commits on success, rolls back and logs on failure.
    async fn finish<T>(
        tx: Transaction<'static, Sqlite>,
        operation: &'static str,
        result: DbResult<T>,
    ) -> DbResult<T> {
        match result {
            Ok(value) => {
                tx.commit()
                    .await
                    .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(operation, error = %rollback_err, "Rollback failed");
                }
                warn!(operation, code = err.code(), error = %err, "Submission rejected");
                Err(err)
            }
        }
    }

    // =========================================================================
    // Purchase Bills
    // =========================================================================

    /// Records a purchase bill: every line raises stock, writes its event
    /// rows in both stores, and lands in the journal under the bill's date.
    pub async fn submit_purchase_bill(&self, bill: &BillSubmission) -> DbResult<BillReceipt> {
        validate_bill_submission(bill)?;

        let mut tx = self.begin_write().await?;
        let result = Self::apply_purchase_bill(&mut tx, bill).await;
        let receipt = Self::finish(tx, "submit_purchase_bill", result).await?;

        info!(
            bill_number = %receipt.bill_number,
            lines = receipt.lines.len(),
            total = %receipt.items_total,
            "Purchase bill committed"
        );

        Ok(receipt)
    }

    async fn apply_purchase_bill(
        conn: &mut SqliteConnection,
        bill: &BillSubmission,
    ) -> DbResult<BillReceipt> {
        let header = &bill.header;
        let bill_number = header.bill_number.trim();
        let date = header.purchase_date;

        if BillRepository::number_exists(&mut *conn, bill_number).await? {
            return Err(CoreError::DuplicateBill {
                bill_number: bill_number.to_string(),
            }
            .into());
        }

        let stored = BillRepository::insert_bill(&mut *conn, header).await?;

        let mut lines = Vec::with_capacity(bill.items.len());
        for (index, item) in bill.items.iter().enumerate() {
            let price = item.price_per_unit;

            let medicine =
                MedicineRepository::find_or_create(&mut *conn, &item.medicine_name, 0, Some(price), date)
                    .await?;
            let medicine =
                MedicineRepository::adjust_stock(&mut *conn, &medicine.id, item.quantity, Some(price), date)
                    .await?;

            BillRepository::insert_item(
                &mut *conn,
                &stored,
                index as i64 + 1,
                &medicine.id,
                &medicine.name,
                item.quantity,
                price.paise(),
            )
            .await?;

            JournalRepository::record_in(&mut *conn, &medicine.name, date, item.quantity).await?;

            debug!(
                bill_number = %bill_number,
                medicine = %medicine.name,
                delta = item.quantity,
                stock = medicine.stock,
                "Bill line applied"
            );

            lines.push(BillLineTotal {
                medicine_id: medicine.id,
                medicine_name: medicine.name,
                quantity: item.quantity,
                price_per_unit: price,
                line_total: price.multiply_quantity(item.quantity),
                stock_after: medicine.stock,
            });
        }

        let items_total: Money = lines.iter().map(|l| l.line_total).sum();
        if items_total != header.grand_total {
            warn!(
                bill_number = %bill_number,
                grand_total = %header.grand_total,
                items_total = %items_total,
                "Bill grand total differs from sum of lines"
            );
        }

        Ok(BillReceipt {
            bill_id: stored.id,
            bill_number: stored.bill_number,
            lines,
            items_total,
            grand_total: header.grand_total,
        })
    }

    // =========================================================================
    // Diagnoses
    // =========================================================================

    /// Records a diagnosis dated today (local clock).
    pub async fn submit_diagnosis(&self, diagnosis: &DiagnosisSubmission) -> DbResult<DiagnosisReceipt> {
        self.submit_diagnosis_on(Local::now().date_naive(), diagnosis).await
    }

    /// Records a diagnosis dated `date`: counts the visit, then dispenses
    /// each prescribed line.
    pub async fn submit_diagnosis_on(
        &self,
        date: NaiveDate,
        diagnosis: &DiagnosisSubmission,
    ) -> DbResult<DiagnosisReceipt> {
        validate_diagnosis_submission(diagnosis)?;

        let mut tx = self.begin_write().await?;
        let result = self.apply_diagnosis(&mut tx, date, diagnosis).await;
        let receipt = Self::finish(tx, "submit_diagnosis", result).await?;

        info!(
            regno = %diagnosis.regno.trim(),
            %date,
            category = %receipt.category,
            lines = receipt.lines.len(),
            "Diagnosis committed"
        );

        Ok(receipt)
    }

    async fn apply_diagnosis(
        &self,
        conn: &mut SqliteConnection,
        date: NaiveDate,
        diagnosis: &DiagnosisSubmission,
    ) -> DbResult<DiagnosisReceipt> {
        let patient = PatientRepository::find(&mut *conn, &diagnosis.regno)
            .await?
            .ok_or_else(|| CoreError::PatientNotFound(diagnosis.regno.trim().to_string()))?;

        let category = patient.category()?;

        // Must precede any stock change: a duplicate has no side effects
        SummaryRepository::register_visit(&mut *conn, date, category, &patient.regno).await?;

        let visit = VisitRepository::insert_visit(
            &mut *conn,
            &patient.regno,
            date,
            &diagnosis.problems,
            &diagnosis.diagnosis,
        )
        .await?;

        let mut lines = Vec::with_capacity(diagnosis.items.len());
        for (index, item) in diagnosis.items.iter().enumerate() {
            let medicine = MedicineRepository::find_by_name(&mut *conn, &item.medicine_name)
                .await?
                .ok_or_else(|| CoreError::MedicineNotFound(item.medicine_name.trim().to_string()))?;

            self.check_floor(&medicine, item.quantity)?;

            let stock_before = medicine.stock;
            let medicine =
                MedicineRepository::adjust_stock(&mut *conn, &medicine.id, -item.quantity, None, date)
                    .await?;

            VisitRepository::insert_prescription(
                &mut *conn,
                &visit.id,
                index as i64 + 1,
                &medicine.name,
                item.quantity,
                &item.instructions,
            )
            .await?;

            JournalRepository::record_out(&mut *conn, &medicine.name, date, item.quantity, stock_before)
                .await?;

            debug!(
                regno = %patient.regno,
                medicine = %medicine.name,
                delta = -item.quantity,
                stock = medicine.stock,
                "Prescription line applied"
            );

            lines.push(PrescriptionLine {
                medicine_id: medicine.id,
                medicine_name: medicine.name,
                quantity: item.quantity,
                stock_after: medicine.stock,
            });
        }

        Ok(DiagnosisReceipt {
            visit_id: visit.id,
            visit_date: date,
            category,
            lines,
        })
    }

    fn check_floor(&self, medicine: &Medicine, requested: i64) -> DbResult<()> {
        if self.settings.enforce_stock_floor && medicine.stock < requested {
            return Err(CoreError::InsufficientStock {
                medicine: medicine.name.clone(),
                available: medicine.stock,
                requested,
            }
            .into());
        }
        Ok(())
    }

    // =========================================================================
    // Catalog Administration
    // =========================================================================

    /// Adds a medicine explicitly. Non-zero starting stock is recorded as an
    /// adjustment event and a journal stock-in dated today.
    pub async fn add_medicine(&self, medicine: &NewMedicine) -> DbResult<Medicine> {
        self.add_medicine_on(Local::now().date_naive(), medicine).await
    }

    pub async fn add_medicine_on(&self, date: NaiveDate, medicine: &NewMedicine) -> DbResult<Medicine> {
        validate_new_medicine(medicine)?;

        let mut tx = self.begin_write().await?;
        let result = Self::apply_add_medicine(&mut tx, date, medicine).await;
        let created = Self::finish(tx, "add_medicine", result).await?;

        info!(medicine = %created.name, stock = created.stock, "Medicine added");
        Ok(created)
    }

    async fn apply_add_medicine(
        conn: &mut SqliteConnection,
        date: NaiveDate,
        medicine: &NewMedicine,
    ) -> DbResult<Medicine> {
        let created = MedicineRepository::insert(
            &mut *conn,
            &medicine.name,
            medicine.stock,
            medicine.price_per_unit,
            date,
        )
        .await?;

        if created.stock > 0 {
            MedicineRepository::record_adjustment(
                &mut *conn,
                &created.id,
                date,
                created.stock,
                Some(OPENING_STOCK_REASON),
            )
            .await?;
            JournalRepository::record_in(&mut *conn, &created.name, date, created.stock).await?;
        }

        Ok(created)
    }

    /// Administrative stock correction and/or price change, dated today.
    pub async fn adjust_medicine(&self, adjustment: &AdjustMedicine) -> DbResult<Medicine> {
        self.adjust_medicine_on(Local::now().date_naive(), adjustment).await
    }

    /// Applies `delta` (and the new price, if any) to one medicine. A non-zero
    /// delta leaves an immutable adjustment row and moves the journal: in for
    /// positive, out for negative.
    pub async fn adjust_medicine_on(
        &self,
        date: NaiveDate,
        adjustment: &AdjustMedicine,
    ) -> DbResult<Medicine> {
        validate_adjustment(adjustment)?;

        let mut tx = self.begin_write().await?;
        let result = self.apply_adjustment(&mut tx, date, adjustment).await;
        let medicine = Self::finish(tx, "adjust_medicine", result).await?;

        info!(
            medicine = %medicine.name,
            delta = adjustment.delta,
            stock = medicine.stock,
            "Medicine adjusted"
        );
        Ok(medicine)
    }

    async fn apply_adjustment(
        &self,
        conn: &mut SqliteConnection,
        date: NaiveDate,
        adjustment: &AdjustMedicine,
    ) -> DbResult<Medicine> {
        let delta = adjustment.delta;

        let medicine = MedicineRepository::find_by_id(&mut *conn, &adjustment.medicine_id)
            .await?
            .ok_or_else(|| CoreError::MedicineNotFound(adjustment.medicine_id.clone()))?;

        if delta < 0 {
            self.check_floor(&medicine, -delta)?;
        }

        let stock_before = medicine.stock;
        let medicine =
            MedicineRepository::adjust_stock(&mut *conn, &medicine.id, delta, adjustment.new_price, date)
                .await?;

        if delta != 0 {
            MedicineRepository::record_adjustment(
                &mut *conn,
                &medicine.id,
                date,
                delta,
                adjustment.reason.as_deref(),
            )
            .await?;

            if delta > 0 {
                JournalRepository::record_in(&mut *conn, &medicine.name, date, delta).await?;
            } else {
                JournalRepository::record_out(&mut *conn, &medicine.name, date, -delta, stock_before)
                    .await?;
            }
        }

        Ok(medicine)
    }

    /// Deletes a medicine nothing references. Fails with `ReferencedEntity`
    /// otherwise.
    pub async fn remove_medicine(&self, medicine_id: &str) -> DbResult<Medicine> {
        validate_id("medicine id", medicine_id)?;

        let mut tx = self.begin_write().await?;
        let result = MedicineRepository::remove(&mut tx, medicine_id).await;
        let removed = Self::finish(tx, "remove_medicine", result).await?;

        info!(medicine = %removed.name, "Medicine removed");
        Ok(removed)
    }
}
