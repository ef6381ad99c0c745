//! # Visit Repository
//!
//! Visits and their prescriptions. Prescriptions are stock-out events and
//! reference the medicine by catalog name.

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use dispensary_core::{PrescribedMedicine, Visit};

const VISIT_COLUMNS: &str = "id, patient_regno, visit_date, problems, diagnosis, created_at";

/// Repository for visits and prescriptions.
#[derive(Debug, Clone)]
pub struct VisitRepository {
    pool: SqlitePool,
}

impl VisitRepository {
    pub fn new(pool: SqlitePool) -> Self {
        VisitRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Visit>> {
        let visit = sqlx::query_as::<_, Visit>(&format!(
            "SELECT {VISIT_COLUMNS} FROM visits WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(visit)
    }

    /// A patient's visits, newest first.
    pub async fn for_patient(&self, regno: &str) -> DbResult<Vec<Visit>> {
        let visits = sqlx::query_as::<_, Visit>(&format!(
            "SELECT {VISIT_COLUMNS} FROM visits WHERE patient_regno = ?1 \
             ORDER BY visit_date DESC, created_at DESC"
        ))
        .bind(regno.trim())
        .fetch_all(&self.pool)
        .await?;

        Ok(visits)
    }

    /// Visits on one date in the order they were recorded.
    pub async fn on_date(&self, date: NaiveDate) -> DbResult<Vec<Visit>> {
        let visits = sqlx::query_as::<_, Visit>(&format!(
            "SELECT {VISIT_COLUMNS} FROM visits WHERE visit_date = ?1 ORDER BY created_at"
        ))
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(visits)
    }

    /// Prescriptions of one visit in line order.
    pub async fn prescriptions(&self, visit_id: &str) -> DbResult<Vec<PrescribedMedicine>> {
        let lines = sqlx::query_as::<_, PrescribedMedicine>(
            r#"
            SELECT id, visit_id, line_no, medicine_name, quantity, instructions
            FROM prescribed_medicines
            WHERE visit_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(visit_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    // =========================================================================
    // Write Side (inside a ledger transaction)
    // =========================================================================

    pub async fn insert_visit(
        conn: &mut SqliteConnection,
        regno: &str,
        date: NaiveDate,
        problems: &str,
        diagnosis: &str,
    ) -> DbResult<Visit> {
        let visit = Visit {
            id: Uuid::new_v4().to_string(),
            patient_regno: regno.to_string(),
            visit_date: date,
            problems: problems.to_string(),
            diagnosis: diagnosis.to_string(),
            created_at: Utc::now(),
        };

        debug!(id = %visit.id, regno = %regno, %date, "Inserting visit");

        sqlx::query(&format!(
            "INSERT INTO visits ({VISIT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        ))
        .bind(&visit.id)
        .bind(&visit.patient_regno)
        .bind(visit.visit_date)
        .bind(&visit.problems)
        .bind(&visit.diagnosis)
        .bind(visit.created_at)
        .execute(conn)
        .await?;

        Ok(visit)
    }

    pub async fn insert_prescription(
        conn: &mut SqliteConnection,
        visit_id: &str,
        line_no: i64,
        medicine_name: &str,
        quantity: i64,
        instructions: &str,
    ) -> DbResult<PrescribedMedicine> {
        let line = PrescribedMedicine {
            id: Uuid::new_v4().to_string(),
            visit_id: visit_id.to_string(),
            line_no,
            medicine_name: medicine_name.to_string(),
            quantity,
            instructions: instructions.to_string(),
        };

        sqlx::query(
            r#"
            INSERT INTO prescribed_medicines (id, visit_id, line_no, medicine_name, quantity, instructions)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&line.id)
        .bind(&line.visit_id)
        .bind(line.line_no)
        .bind(&line.medicine_name)
        .bind(line.quantity)
        .bind(&line.instructions)
        .execute(conn)
        .await?;

        Ok(line)
    }
}
