//! # Database Handle
//!
//! Opens the dispensary's SQLite file and hands out repositories and the
//! ledger, all sharing one pool.
//!
//! ## Who Uses Which Connection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  dispensary.toml ──► DispensaryConfig ──► DbConfig ──► Database::new    │
//! │                                                          │              │
//! │                     SqlitePool (WAL, foreign_keys=ON) ◄──┘              │
//! │                                                                         │
//! │   Bill entry ─────┐                                                     │
//! │   Diagnosis ──────┼─► Ledger ── BEGIN IMMEDIATE ──► one writer at a    │
//! │   Catalog admin ──┘                                 time; the rest     │
//! │                                                     wait busy_timeout  │
//! │                                                                         │
//! │   Stock report ───┐                                                     │
//! │   Lookups ────────┴─► repositories (read side) ──► never blocked by    │
//! │                                                     the writer (WAL)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{DispensaryConfig, LedgerSettings};
use crate::error::{DbError, DbResult};
use crate::ledger::Ledger;
use crate::migrations;
use crate::repository::bill::BillRepository;
use crate::repository::journal::JournalRepository;
use crate::repository::medicine::MedicineRepository;
use crate::repository::patient::PatientRepository;
use crate::repository::report::ReportRepository;
use crate::repository::summary::SummaryRepository;
use crate::repository::visit::VisitRepository;

// =============================================================================
// Configuration
// =============================================================================

/// How to open the dispensary database.
///
/// Usually built from [`DispensaryConfig`]; the builder methods exist for
/// tests and tools.
///
/// ```rust,ignore
/// let config = DbConfig::new("/srv/clinic/dispensary.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,

    /// Pool ceiling (default 5). Readers share it with the single writer.
    pub max_connections: u32,

    pub min_connections: u32,

    /// How long `acquire` waits for a free pooled connection (default 30 s).
    pub connect_timeout: Duration,

    pub idle_timeout: Duration,

    /// How long a ledger submission waits for the write lock before it
    /// fails (default 5 s).
    pub busy_timeout: Duration,

    /// Apply embedded migrations on open (default true).
    pub run_migrations: bool,

    pub ledger: LedgerSettings,
}

impl DbConfig {
    /// Defaults for a file database at `path`; the file and its parent
    /// directory are created on open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
            ledger: LedgerSettings::default(),
        }
    }

    /// A private in-memory database.
    ///
    /// Every pooled connection to `:memory:` would see its own empty
    /// database, so the pool is capped at one connection. Callers must not
    /// hold an acquired connection while calling a pool-backed method.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            ..DbConfig::new(":memory:")
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn ledger(mut self, settings: LedgerSettings) -> Self {
        self.ledger = settings;
        self
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let url = format!("sqlite://{}?mode=rwc", self.database_path.display());

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // Off by default in SQLite; the schema relies on them
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout)
            .create_if_missing(true);

        Ok(options)
    }
}

impl From<&DispensaryConfig> for DbConfig {
    fn from(config: &DispensaryConfig) -> Self {
        config.db_config().ledger(config.ledger)
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the dispensary database.
///
/// ```rust,ignore
/// let db = Database::new(DbConfig::from(&config)).await?;
///
/// let receipt = db.ledger().submit_purchase_bill(&bill).await?;
/// let movement = db.reports().stock_movement(from, to).await?;
/// ```
///
/// Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    ledger_settings: LedgerSettings,
}

impl Database {
    /// Opens (creating if needed) the database, builds the pool and applies
    /// migrations when `run_migrations` is set.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening dispensary database");

        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!(dir = %parent.display(), "Creating database directory");
                std::fs::create_dir_all(parent)
                    .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            busy_timeout_ms = config.busy_timeout.as_millis() as u64,
            enforce_stock_floor = config.ledger.enforce_stock_floor,
            "Pool ready"
        );

        let db = Database {
            pool,
            ledger_settings: config.ledger,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending migrations. Safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The Ledger Transaction Coordinator. Every stock-affecting write goes
    /// through here.
    pub fn ledger(&self) -> Ledger {
        Ledger::new(self.pool.clone(), self.ledger_settings)
    }

    pub fn medicines(&self) -> MedicineRepository {
        MedicineRepository::new(self.pool.clone())
    }

    pub fn journal(&self) -> JournalRepository {
        JournalRepository::new(self.pool.clone())
    }

    pub fn summaries(&self) -> SummaryRepository {
        SummaryRepository::new(self.pool.clone())
    }

    pub fn bills(&self) -> BillRepository {
        BillRepository::new(self.pool.clone())
    }

    pub fn visits(&self) -> VisitRepository {
        VisitRepository::new(self.pool.clone())
    }

    pub fn patients(&self) -> PatientRepository {
        PatientRepository::new(self.pool.clone())
    }

    /// Stock movement, purchase register and reconciliation reports.
    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.pool.clone())
    }

    /// Waits for checked-out connections to return, then closes the pool.
    pub async fn close(&self) {
        info!("Closing dispensary database");
        self.pool.close().await;
    }

    /// `true` when a trivial query round-trips.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);
        assert_eq!(db.medicines().count().await.unwrap(), 0);
    }

    #[test]
    fn test_config_from_app_config() {
        let mut app = DispensaryConfig::default();
        app.database.path = PathBuf::from("/srv/clinic/dispensary.db");
        app.database.max_connections = 8;
        app.ledger.enforce_stock_floor = true;

        let config = DbConfig::from(&app).min_connections(2);

        assert_eq!(config.database_path, PathBuf::from("/srv/clinic/dispensary.db"));
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.min_connections, 2);
        assert!(config.ledger.enforce_stock_floor);
    }

    #[test]
    fn test_in_memory_single_connection() {
        let config = DbConfig::in_memory();
        assert_eq!(config.max_connections, 1);
        assert!(!config.ledger.enforce_stock_floor);
    }

    #[tokio::test]
    async fn test_stock_floor_from_file_reaches_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dispensary.toml");
        std::fs::write(&path, "[ledger]\nenforce_stock_floor = true\n").unwrap();

        let app = DispensaryConfig::load(Some(path)).unwrap();
        let db = Database::new(DbConfig::in_memory().ledger(app.ledger))
            .await
            .unwrap();
        assert!(db.ledger().settings().enforce_stock_floor);

        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(!db.ledger().settings().enforce_stock_floor);
    }

    #[tokio::test]
    async fn test_file_database_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic").join("dispensary.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        assert!(db.health_check().await);
        assert!(path.exists());

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(mode, "wal");
        db.close().await;
    }
}
