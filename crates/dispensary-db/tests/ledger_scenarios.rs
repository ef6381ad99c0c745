//! End-to-end ledger scenarios against an in-memory database.
//!
//! Each test drives the public API only: ledger submissions in, repository
//! reads and reports out.

use chrono::NaiveDate;
use dispensary_core::{
    BillHeader, BillItemInput, BillSubmission, CoreError, DiagnosisSubmission, Money, Patient,
    PrescriptionInput, StockMovement,
};
use dispensary_db::{Database, DbConfig, DbError};

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

fn bill(number: &str, day: u32, items: &[(&str, i64, i64)]) -> BillSubmission {
    BillSubmission {
        header: BillHeader {
            bill_number: number.to_string(),
            purchase_date: date(day),
            enterprise_name: Some("City Pharma".to_string()),
            grand_total: Money::from_paise(items.iter().map(|(_, q, p)| q * p).sum()),
        },
        items: items
            .iter()
            .map(|(name, quantity, price)| BillItemInput {
                medicine_name: name.to_string(),
                quantity: *quantity,
                price_per_unit: Money::from_paise(*price),
            })
            .collect(),
    }
}

fn diagnosis(regno: &str, items: &[(&str, i64)]) -> DiagnosisSubmission {
    DiagnosisSubmission {
        regno: regno.to_string(),
        problems: "headache".to_string(),
        diagnosis: "tension headache".to_string(),
        items: items
            .iter()
            .map(|(name, quantity)| PrescriptionInput {
                medicine_name: name.to_string(),
                quantity: *quantity,
                instructions: String::new(),
            })
            .collect(),
    }
}

fn patient(regno: &str, gender: &str, patient_type: &str) -> Patient {
    Patient {
        regno: regno.to_string(),
        name: format!("Patient {regno}"),
        age: Some(21),
        gender: gender.to_string(),
        patient_type: patient_type.to_string(),
        registered_on: date(1),
        mobile: None,
        department: None,
        stay_type: None,
    }
}

async fn setup() -> Database {
    let db = Database::new(DbConfig::in_memory())
        .await
        .expect("Failed to open in-memory database");

    for (regno, gender, patient_type) in [
        ("21CS01", "Male", "Student"),
        ("21EC07", "Female", "Student"),
        ("STF/104", "Female", "Staff"),
        ("STF/220", "male", " staff "),
    ] {
        db.patients()
            .register(&patient(regno, gender, patient_type))
            .await
            .expect("Failed to register patient");
    }

    db
}

fn movement_of<'a>(rows: &'a [StockMovement], name: &str) -> &'a StockMovement {
    rows.iter()
        .find(|m| m.medicine_name == name)
        .unwrap_or_else(|| panic!("No movement row for {name}"))
}

#[tokio::test]
async fn test_purchase_then_dispense_report() {
    let db = setup().await;
    let ledger = db.ledger();

    ledger
        .submit_purchase_bill(&bill("B1", 10, &[("Paracetamol", 100, 200)]))
        .await
        .unwrap();
    ledger
        .submit_diagnosis_on(date(11), &diagnosis("21CS01", &[("Paracetamol", 10)]))
        .await
        .unwrap();

    let reports = db.reports();

    let rows = reports.stock_movement(date(10), date(11)).await.unwrap();
    let para = movement_of(&rows, "Paracetamol");
    assert_eq!(
        (para.opening_stock, para.stock_in, para.stock_out, para.closing_stock),
        (100, 100, 10, 90)
    );

    let rows = reports.stock_movement(date(11), date(11)).await.unwrap();
    let para = movement_of(&rows, "Paracetamol");
    assert_eq!(
        (para.opening_stock, para.stock_in, para.stock_out, para.closing_stock),
        (100, 0, 10, 90)
    );

    let rows = reports.journal_movement(date(11), date(11)).await.unwrap();
    let para = movement_of(&rows, "Paracetamol");
    assert_eq!(
        (para.opening_stock, para.stock_in, para.stock_out, para.closing_stock),
        (100, 0, 10, 90)
    );

    assert!(reports.journal_drift(date(10), date(11)).await.unwrap().is_empty());
    assert!(reports.catalog_drift().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_medicine_without_events_reports_zeros() {
    let db = setup().await;
    db.ledger()
        .add_medicine_on(
            date(5),
            &dispensary_core::NewMedicine {
                name: "Zinc".to_string(),
                stock: 0,
                price_per_unit: None,
            },
        )
        .await
        .unwrap();

    let rows = db.reports().stock_movement(date(10), date(11)).await.unwrap();
    let zinc = movement_of(&rows, "Zinc");
    assert_eq!(
        (zinc.opening_stock, zinc.stock_in, zinc.stock_out, zinc.closing_stock),
        (0, 0, 0, 0)
    );

    let err = db
        .reports()
        .stock_movement(date(11), date(10))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION");
}

#[tokio::test]
async fn test_summary_counts_each_category() {
    let db = setup().await;
    let ledger = db.ledger();

    for regno in ["21EC07", "STF/104", "21CS01", "STF/220"] {
        ledger
            .submit_diagnosis_on(date(11), &diagnosis(regno, &[]))
            .await
            .unwrap();
    }

    let summary = db.summaries().get(date(11)).await.unwrap().unwrap();
    assert_eq!(summary.male_student, 1);
    assert_eq!(summary.female_student, 1);
    assert_eq!(summary.male_staff, 1);
    assert_eq!(summary.female_staff, 1);
    assert_eq!(summary.total_entries, 4);
    assert!(summary.is_consistent());
    assert_eq!(summary.regnos, vec!["21EC07", "STF/104", "21CS01", "STF/220"]);

    let range = db.summaries().summaries_between(date(1), date(31)).await.unwrap();
    assert_eq!(range.len(), 1);
}

#[tokio::test]
async fn test_legacy_bill_number_blocks_new_bill() {
    let db = setup().await;

    sqlx::query(
        "INSERT INTO bills (bill_no, bill_date, grand_total_paise, enterprise_name) \
         VALUES ('INV-2023-88', '2023-12-30', 5000, 'Old Supplier')",
    )
    .execute(db.pool())
    .await
    .unwrap();

    let err = db
        .ledger()
        .submit_purchase_bill(&bill("INV-2023-88", 10, &[("Cetirizine", 20, 150)]))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::DuplicateBill { .. })));
    assert!(db.medicines().get_by_name("Cetirizine").await.unwrap().is_none());
}

#[tokio::test]
async fn test_repeated_purchases_update_price_and_stock() {
    let db = setup().await;
    let ledger = db.ledger();

    ledger
        .submit_purchase_bill(&bill("B1", 10, &[("Paracetamol", 100, 200), ("ORS", 20, 2_000)]))
        .await
        .unwrap();
    ledger
        .submit_purchase_bill(&bill("B2", 10, &[("PARACETAMOL", 50, 180)]))
        .await
        .unwrap();

    let para = db.medicines().get_by_name("paracetamol").await.unwrap().unwrap();
    assert_eq!(para.name, "Paracetamol");
    assert_eq!(para.stock, 150);
    assert_eq!(para.price_per_unit(), Some(Money::from_paise(180)));
    assert_eq!(db.medicines().count().await.unwrap(), 2);

    // Both purchases land on the same journal row
    let day = db.journal().get("Paracetamol", date(10)).await.unwrap().unwrap();
    assert_eq!(day.entry.opening_stock, 0);
    assert_eq!(day.entry.stock_in, 150);
    assert_eq!(day.entry.closing_stock, 150);

    let lines = db.reports().purchase_report(date(10), date(10)).await.unwrap();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0].bill_no, "B1");
    assert_eq!(lines[0].line_total_paise, 20_000);
    assert_eq!(lines[2].medicine_name, "Paracetamol");
    assert_eq!(lines[2].line_total_paise, 9_000);
}

#[tokio::test]
async fn test_backdated_bill_shows_as_journal_drift() {
    let db = setup().await;
    let ledger = db.ledger();

    ledger
        .submit_purchase_bill(&bill("B1", 12, &[("Paracetamol", 100, 200)]))
        .await
        .unwrap();
    ledger
        .submit_diagnosis_on(date(13), &diagnosis("21CS01", &[("Paracetamol", 10)]))
        .await
        .unwrap();
    ledger
        .submit_purchase_bill(&bill("B0", 11, &[("Paracetamol", 50, 200)]))
        .await
        .unwrap();

    let para = db.medicines().get_by_name("Paracetamol").await.unwrap().unwrap();
    assert_eq!(para.stock, 140);

    // Later rows keep their openings
    let day12 = db.journal().get("Paracetamol", date(12)).await.unwrap().unwrap();
    assert_eq!(day12.entry.opening_stock, 0);

    let rows = db.reports().stock_movement(date(11), date(13)).await.unwrap();
    assert_eq!(movement_of(&rows, "Paracetamol").closing_stock, 140);

    let drift = db.reports().journal_drift(date(11), date(13)).await.unwrap();
    assert_eq!(drift.len(), 1);
    assert_eq!(drift[0].event_log.closing_stock, 140);
    assert_eq!(drift[0].journal.closing_stock, 90);

    // The catalog itself is still right
    assert!(db.reports().catalog_drift().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_catalog_drift_detects_out_of_band_edit() {
    let db = setup().await;
    db.ledger()
        .submit_purchase_bill(&bill("B1", 10, &[("Paracetamol", 100, 200)]))
        .await
        .unwrap();

    sqlx::query("UPDATE medicines SET stock = 95 WHERE name = 'Paracetamol'")
        .execute(db.pool())
        .await
        .unwrap();

    let drift = db.reports().catalog_drift().await.unwrap();
    assert_eq!(drift.len(), 1);
    assert_eq!(drift[0].catalog_stock, 95);
    assert_eq!(drift[0].event_stock, 100);
}

#[tokio::test]
async fn test_event_rows_are_append_only() {
    let db = setup().await;
    db.ledger()
        .submit_purchase_bill(&bill("B1", 10, &[("Paracetamol", 100, 200)]))
        .await
        .unwrap();

    let err = sqlx::query("DELETE FROM purchase_bill_items")
        .execute(db.pool())
        .await
        .unwrap_err();
    assert!(matches!(DbError::from(err), DbError::ConstraintViolation(_)));

    let err = sqlx::query("UPDATE bill_particulars SET quantity = 1")
        .execute(db.pool())
        .await
        .unwrap_err();
    assert!(matches!(DbError::from(err), DbError::ConstraintViolation(_)));
}

#[tokio::test]
async fn test_visit_history() {
    let db = setup().await;
    let ledger = db.ledger();

    ledger
        .submit_purchase_bill(&bill("B1", 10, &[("Paracetamol", 100, 200), ("Cetirizine", 30, 150)]))
        .await
        .unwrap();

    let first = ledger
        .submit_diagnosis_on(
            date(11),
            &diagnosis("21EC07", &[("Cetirizine", 5), ("Paracetamol", 6)]),
        )
        .await
        .unwrap();
    ledger
        .submit_diagnosis_on(date(14), &diagnosis("21EC07", &[("Paracetamol", 4)]))
        .await
        .unwrap();

    let visits = db.visits().for_patient("21EC07").await.unwrap();
    assert_eq!(visits.len(), 2);
    assert_eq!(visits[0].visit_date, date(14));

    let lines = db.visits().prescriptions(&first.visit_id).await.unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].medicine_name, "Cetirizine");
    assert_eq!(lines[1].line_no, 2);

    let para = db.medicines().get_by_name("Paracetamol").await.unwrap().unwrap();
    assert_eq!(para.stock, 90);
}

#[tokio::test]
async fn test_invalid_line_rejects_whole_bill() {
    let db = setup().await;

    let err = db
        .ledger()
        .submit_purchase_bill(&bill(
            "B1",
            10,
            &[("Paracetamol", 100, 200), ("Cetirizine", 30, 150), ("ORS", 20, 2_000), ("  ", 5, 100)],
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION");

    assert_eq!(db.medicines().count().await.unwrap(), 0);
    assert_eq!(db.bills().count().await.unwrap(), (0, 0));
    assert!(db.journal().rows_between(date(1), date(31)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_blocked_by_purchase_and_prescription() {
    let db = setup().await;
    let ledger = db.ledger();

    ledger
        .submit_purchase_bill(&bill("B1", 10, &[("Paracetamol", 100, 200)]))
        .await
        .unwrap();
    ledger
        .submit_diagnosis_on(date(11), &diagnosis("21CS01", &[("Paracetamol", 10)]))
        .await
        .unwrap();

    let para = db.medicines().get_by_name("Paracetamol").await.unwrap().unwrap();
    let err = ledger.remove_medicine(&para.id).await.unwrap_err();
    match err {
        DbError::Domain(CoreError::ReferencedEntity {
            purchase_items,
            bill_particulars,
            prescriptions,
            adjustments,
            ..
        }) => {
            assert_eq!((purchase_items, bill_particulars, prescriptions, adjustments), (1, 1, 1, 0));
        }
        other => panic!("Expected ReferencedEntity, got {other:?}"),
    }
    assert!(db.medicines().get_by_id(&para.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_history_reads() {
    let db = setup().await;
    let ledger = db.ledger();

    ledger
        .submit_purchase_bill(&bill("B1", 10, &[("Paracetamol", 100, 200)]))
        .await
        .unwrap();
    ledger
        .submit_purchase_bill(&bill("B2", 15, &[("Paracetamol", 20, 200)]))
        .await
        .unwrap();
    ledger
        .submit_diagnosis_on(date(12), &diagnosis("21CS01", &[("Paracetamol", 10)]))
        .await
        .unwrap();

    let history = db.journal().history("paracetamol").await.unwrap();
    let dates: Vec<NaiveDate> = history.iter().map(|row| row.journal_date).collect();
    assert_eq!(dates, vec![date(10), date(12), date(15)]);
    assert_eq!(history[2].entry.opening_stock, 90);
    assert!(history.iter().all(|row| row.entry.is_balanced()));

    let bills = db.bills().bills_between(date(11), date(31)).await.unwrap();
    assert_eq!(bills.len(), 1);
    assert_eq!(bills[0].bill_number, "B2");

    let items = db.bills().get_items(&bills[0].id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 20);
}
