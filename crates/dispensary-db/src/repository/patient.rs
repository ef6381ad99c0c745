//! # Patient Repository
//!
//! The patient registry. The ledger consumes only the lookup; registration
//! and updates serve the registration forms.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use dispensary_core::validation::validate_regno;
use dispensary_core::{CoreError, Patient, ValidationError};

const PATIENT_COLUMNS: &str =
    "regno, name, age, gender, patient_type, registered_on, mobile, department, stay_type";

/// Repository for patients.
#[derive(Debug, Clone)]
pub struct PatientRepository {
    pool: SqlitePool,
}

impl PatientRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PatientRepository { pool }
    }

    /// Registers a new patient. Fails with `PatientExists` on a taken regno.
    ///
    /// Gender and type are stored as entered; a pair that maps to no visit
    /// category is only rejected when the patient is diagnosed.
    pub async fn register(&self, patient: &Patient) -> DbResult<Patient> {
        validate_regno(&patient.regno)?;
        if patient.name.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "name".to_string(),
            }
            .into());
        }

        let mut patient = patient.clone();
        patient.regno = patient.regno.trim().to_string();

        debug!(regno = %patient.regno, "Registering patient");

        let result = sqlx::query(&format!(
            "INSERT INTO patients ({PATIENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ))
        .bind(&patient.regno)
        .bind(&patient.name)
        .bind(patient.age)
        .bind(&patient.gender)
        .bind(&patient.patient_type)
        .bind(patient.registered_on)
        .bind(&patient.mobile)
        .bind(&patient.department)
        .bind(&patient.stay_type)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(patient),
            Err(e) => match DbError::from(e) {
                DbError::UniqueViolation { .. } => Err(CoreError::PatientExists(patient.regno).into()),
                other => Err(other),
            },
        }
    }

    pub async fn get_by_regno(&self, regno: &str) -> DbResult<Option<Patient>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, regno).await
    }

    /// Updates every field except the regno.
    pub async fn update(&self, patient: &Patient) -> DbResult<()> {
        debug!(regno = %patient.regno, "Updating patient");

        let result = sqlx::query(
            r#"
            UPDATE patients
            SET
                name = ?2,
                age = ?3,
                gender = ?4,
                patient_type = ?5,
                registered_on = ?6,
                mobile = ?7,
                department = ?8,
                stay_type = ?9
            WHERE regno = ?1
            "#,
        )
        .bind(patient.regno.trim())
        .bind(&patient.name)
        .bind(patient.age)
        .bind(&patient.gender)
        .bind(&patient.patient_type)
        .bind(patient.registered_on)
        .bind(&patient.mobile)
        .bind(&patient.department)
        .bind(&patient.stay_type)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::PatientNotFound(patient.regno.clone()).into());
        }

        Ok(())
    }

    /// Patients ordered by regno, for registry listings.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Patient>> {
        let patients = sqlx::query_as::<_, Patient>(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients ORDER BY regno LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(patients)
    }

    /// Lookup used inside a ledger transaction.
    pub async fn find(conn: &mut SqliteConnection, regno: &str) -> DbResult<Option<Patient>> {
        let patient = sqlx::query_as::<_, Patient>(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE regno = ?1"
        ))
        .bind(regno.trim())
        .fetch_optional(conn)
        .await?;

        Ok(patient)
    }
}
