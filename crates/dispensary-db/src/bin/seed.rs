//! # Seed Data Generator
//!
//! Populates a dispensary database with demo patients, an opening purchase
//! bill and a few diagnoses, all through the ledger.
//!
//! ## Usage
//! ```bash
//! # 40 patients (default), database from dispensary.toml
//! cargo run -p dispensary-db --bin seed
//!
//! # Custom amount and path
//! cargo run -p dispensary-db --bin seed -- --count 200 --db ./data/dispensary.db
//! ```
//!
//! Logging follows `RUST_LOG`; the default is
//! `info,dispensary=debug,sqlx=warn`.

use chrono::{Duration, Local, NaiveDate};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dispensary_core::{
    BillHeader, BillItemInput, BillSubmission, DiagnosisSubmission, Money, Patient,
    PrescriptionInput,
};
use dispensary_db::{Database, DbConfig, DispensaryConfig};

/// Opening stock: (name, quantity, price in paise)
const FORMULARY: &[(&str, i64, i64)] = &[
    ("Paracetamol 500mg", 500, 200),
    ("Cetirizine 10mg", 300, 150),
    ("Amoxicillin 250mg", 200, 600),
    ("Ibuprofen 400mg", 300, 350),
    ("ORS Sachet", 150, 2_000),
    ("Pantoprazole 40mg", 200, 800),
    ("Azithromycin 500mg", 100, 2_500),
    ("Dolo 650", 400, 300),
    ("Betadine Ointment", 50, 9_500),
    ("Crepe Bandage", 60, 4_500),
];

const COMPLAINTS: &[(&str, &str, &str, i64)] = &[
    ("fever, body ache", "viral fever", "Paracetamol 500mg", 6),
    ("sneezing", "allergic rhinitis", "Cetirizine 10mg", 5),
    ("sore throat", "pharyngitis", "Amoxicillin 250mg", 10),
    ("loose motions", "gastroenteritis", "ORS Sachet", 4),
    ("acidity", "gastritis", "Pantoprazole 40mg", 7),
    ("sprained ankle", "ligament sprain", "Crepe Bandage", 1),
];

const DEPARTMENTS: &[&str] = &["CSE", "ECE", "MECH", "CIVIL", "EEE"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 40;
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(40);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Dispensary Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of patients to register (default: 40)");
                println!("  -d, --db <PATH>    Database file path (default: from dispensary.toml)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let app_config = DispensaryConfig::load_or_default(None);
    let mut config = DbConfig::from(&app_config);
    if let Some(path) = db_path {
        config.database_path = path;
    }

    info!(path = %config.database_path.display(), patients = count, "Seeding database");

    let db = Database::new(config).await?;

    let existing = db.medicines().count().await?;
    if existing > 0 {
        warn!(medicines = existing, "Database already seeded, delete the file to regenerate");
        return Ok(());
    }

    let today = Local::now().date_naive();
    let start = std::time::Instant::now();

    let mut regnos = Vec::with_capacity(count);
    for n in 0..count {
        let patient = demo_patient(n, today - Duration::days(90));
        match db.patients().register(&patient).await {
            Ok(p) => regnos.push(p.regno),
            Err(e) => warn!(regno = %patient.regno, error = %e, "Failed to register patient"),
        }
    }
    info!(registered = regnos.len(), "Patients registered");

    let receipt = db
        .ledger()
        .submit_purchase_bill(&opening_bill(today - Duration::days(30)))
        .await?;
    info!(
        bill_number = %receipt.bill_number,
        lines = receipt.lines.len(),
        total = %receipt.items_total,
        "Opening bill recorded"
    );

    let mut visits = 0;
    for (n, regno) in regnos.iter().enumerate().filter(|(n, _)| n % 3 == 0) {
        let (problems, diagnosis, medicine, quantity) = COMPLAINTS[n % COMPLAINTS.len()];
        let submission = DiagnosisSubmission {
            regno: regno.clone(),
            problems: problems.to_string(),
            diagnosis: diagnosis.to_string(),
            items: vec![PrescriptionInput {
                medicine_name: medicine.to_string(),
                quantity,
                instructions: "after food".to_string(),
            }],
        };

        let visit_date = today - Duration::days((n % 7) as i64);
        match db.ledger().submit_diagnosis_on(visit_date, &submission).await {
            Ok(_) => visits += 1,
            Err(e) => warn!(regno = %regno, error = %e, "Failed to record diagnosis"),
        }
    }

    let drift = db.reports().catalog_drift().await?;
    info!(
        visits,
        drift = drift.len(),
        elapsed = ?start.elapsed(),
        "Seed complete"
    );

    Ok(())
}

/// Initializes the tracing subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dispensary=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn demo_patient(n: usize, registered_on: NaiveDate) -> Patient {
    let staff = n % 5 == 4;
    let gender = if n % 2 == 0 { "Male" } else { "Female" };
    let department = DEPARTMENTS[n % DEPARTMENTS.len()];

    let regno = if staff {
        format!("STF/{:03}", n)
    } else {
        format!("23{}{:03}", department, n)
    };

    Patient {
        regno,
        name: format!("Patient {}", n + 1),
        age: Some(if staff { 30 + (n % 25) as i64 } else { 18 + (n % 5) as i64 }),
        gender: gender.to_string(),
        patient_type: if staff { "Staff" } else { "Student" }.to_string(),
        registered_on,
        mobile: Some(format!("98{:08}", n)),
        department: Some(department.to_string()),
        stay_type: (!staff).then(|| if n % 3 == 0 { "Day Scholar" } else { "Hosteller" }.to_string()),
    }
}

fn opening_bill(purchase_date: NaiveDate) -> BillSubmission {
    let items: Vec<BillItemInput> = FORMULARY
        .iter()
        .map(|(name, quantity, price)| BillItemInput {
            medicine_name: name.to_string(),
            quantity: *quantity,
            price_per_unit: Money::from_paise(*price),
        })
        .collect();

    let grand_total = items
        .iter()
        .map(|item| item.price_per_unit.multiply_quantity(item.quantity))
        .sum();

    BillSubmission {
        header: BillHeader {
            bill_number: format!("OPEN-{}", purchase_date.format("%Y%m%d")),
            purchase_date,
            enterprise_name: Some("District Medical Stores".to_string()),
            grand_total,
        },
        items,
    }
}
