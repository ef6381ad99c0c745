//! Concurrency tests for the ledger.
//!
//! These tests run many submissions at once against one file-backed
//! database with several pooled connections and verify that:
//! - No stock movement is lost
//! - A patient is counted at most once per day
//! - Catalog, journal and event log agree afterwards

use chrono::NaiveDate;
use dispensary_core::{
    BillHeader, BillItemInput, BillSubmission, CoreError, DiagnosisSubmission, Money, Patient,
    PrescriptionInput,
};
use dispensary_db::{Database, DbConfig, DbError};
use tempfile::TempDir;

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

async fn open(dir: &TempDir) -> Database {
    let config = DbConfig::new(dir.path().join("dispensary.db")).max_connections(6);
    Database::new(config).await.expect("Failed to open database")
}

fn purchase(number: String, day: u32, name: &str, quantity: i64) -> BillSubmission {
    BillSubmission {
        header: BillHeader {
            bill_number: number,
            purchase_date: date(day),
            enterprise_name: None,
            grand_total: Money::from_paise(quantity * 100),
        },
        items: vec![BillItemInput {
            medicine_name: name.to_string(),
            quantity,
            price_per_unit: Money::from_paise(100),
        }],
    }
}

fn dispense(regno: &str, name: &str, quantity: i64) -> DiagnosisSubmission {
    DiagnosisSubmission {
        regno: regno.to_string(),
        problems: "cold".to_string(),
        diagnosis: "common cold".to_string(),
        items: vec![PrescriptionInput {
            medicine_name: name.to_string(),
            quantity,
            instructions: "twice daily".to_string(),
        }],
    }
}

async fn register_students(db: &Database, count: usize) -> Vec<String> {
    let mut regnos = Vec::with_capacity(count);
    for n in 0..count {
        let regno = format!("22ME{:03}", n);
        db.patients()
            .register(&Patient {
                regno: regno.clone(),
                name: format!("Student {n}"),
                age: Some(20),
                gender: if n % 2 == 0 { "Male" } else { "Female" }.to_string(),
                patient_type: "Student".to_string(),
                registered_on: date(1),
                mobile: None,
                department: Some("MECH".to_string()),
                stay_type: Some("Hosteller".to_string()),
            })
            .await
            .expect("Failed to register patient");
        regnos.push(regno);
    }
    regnos
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_diagnoses_lose_no_stock() {
    let dir = setup_test_dir();
    let db = open(&dir).await;
    let regnos = register_students(&db, 24).await;

    db.ledger()
        .submit_purchase_bill(&purchase("OPEN-1".to_string(), 4, "Paracetamol", 1_000))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for regno in regnos {
        let ledger = db.ledger();
        handles.push(tokio::spawn(async move {
            ledger
                .submit_diagnosis_on(date(5), &dispense(&regno, "Paracetamol", 3))
                .await
        }));
    }

    for handle in handles {
        handle.await.expect("Task panicked").expect("Diagnosis failed");
    }

    let para = db.medicines().get_by_name("Paracetamol").await.unwrap().unwrap();
    assert_eq!(para.stock, 1_000 - 24 * 3);

    let day = db.journal().get("Paracetamol", date(5)).await.unwrap().unwrap();
    assert_eq!(day.entry.opening_stock, 1_000);
    assert_eq!(day.entry.stock_out, 72);
    assert_eq!(day.entry.closing_stock, para.stock);

    let summary = db.summaries().get(date(5)).await.unwrap().unwrap();
    assert_eq!(summary.total_entries, 24);
    assert_eq!(summary.male_student + summary.female_student, 24);
    assert!(summary.is_consistent());

    assert!(db.reports().catalog_drift().await.unwrap().is_empty());
    assert!(db.reports().journal_drift(date(4), date(5)).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_patient_counted_once() {
    let dir = setup_test_dir();
    let db = open(&dir).await;
    register_students(&db, 1).await;

    db.ledger()
        .submit_purchase_bill(&purchase("OPEN-1".to_string(), 4, "Cetirizine", 100))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ledger = db.ledger();
        handles.push(tokio::spawn(async move {
            ledger
                .submit_diagnosis_on(date(5), &dispense("22ME000", "Cetirizine", 2))
                .await
        }));
    }

    let mut accepted = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.expect("Task panicked") {
            Ok(_) => accepted += 1,
            Err(DbError::Domain(CoreError::DuplicateVisit { .. })) => duplicates += 1,
            Err(e) => panic!("Unexpected error: {e}"),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(duplicates, 7);

    let cetirizine = db.medicines().get_by_name("Cetirizine").await.unwrap().unwrap();
    assert_eq!(cetirizine.stock, 98);
    assert_eq!(db.summaries().get(date(5)).await.unwrap().unwrap().total_entries, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bills_create_one_medicine() {
    let dir = setup_test_dir();
    let db = open(&dir).await;

    let mut handles = Vec::new();
    for n in 0..12 {
        let ledger = db.ledger();
        // Mixed case on purpose: all lines must land on one catalog row
        let name = if n % 2 == 0 { "Ibuprofen" } else { "IBUPROFEN" };
        handles.push(tokio::spawn(async move {
            ledger
                .submit_purchase_bill(&purchase(format!("B-{n}"), 6, name, 10))
                .await
        }));
    }

    for handle in handles {
        handle.await.expect("Task panicked").expect("Bill failed");
    }

    assert_eq!(db.medicines().count().await.unwrap(), 1);
    let ibuprofen = db.medicines().get_by_name("ibuprofen").await.unwrap().unwrap();
    assert_eq!(ibuprofen.stock, 120);
    assert_eq!(db.bills().count().await.unwrap(), (12, 12));
    assert!(db.reports().catalog_drift().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reopened_database_keeps_ledger() {
    let dir = setup_test_dir();
    {
        let db = open(&dir).await;
        db.ledger()
            .submit_purchase_bill(&purchase("B1".to_string(), 4, "ORS", 40))
            .await
            .unwrap();
        db.close().await;
    }

    let db = open(&dir).await;
    let ors = db.medicines().get_by_name("ORS").await.unwrap().unwrap();
    assert_eq!(ors.stock, 40);

    let err = db
        .ledger()
        .submit_purchase_bill(&purchase("B1".to_string(), 5, "ORS", 40))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::DuplicateBill { .. })));
}
