//! sqlite-adapter — rusqlite implementation of the `MutationStore` port plus
//! disposable in-memory databases for test isolation.
//!
//! Purpose
//! - Provide throwaway in-memory SQLite instances so tests never need a
//!   running database server or on-disk files.
//! - Implements the `MutationStore` trait from the `domain` crate by fanning
//!   SQLite's update hook out to named, per-mutation-kind callbacks.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Hooks observe mutations made through this handle only; a second handle
//!   onto the same named instance has its own hook table.
//! - SQLite fires the update hook once per affected row, so a multi-row
//!   statement counts once per row.
//! - Hooks run while the connection lock is held; do not issue SQL from
//!   inside a hook.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use domain::{
//!     ensure_completion, expect_created, EnsureConfig, ExpectConfig, Model, Reporter,
//!     TestReporter,
//! };
//! use sqlite_adapter::{MemoryConfig, MemoryDatabase};
//!
//! struct Invoice;
//!
//! impl Model for Invoice {
//!     fn table_name(&self) -> &str {
//!         "invoices"
//!     }
//! }
//!
//! let reporter = Arc::new(TestReporter::new());
//! let db = MemoryDatabase::open(MemoryConfig::new()).unwrap();
//! db.execute_batch("CREATE TABLE invoices (id INTEGER PRIMARY KEY, total INTEGER)")
//!     .unwrap();
//!
//! let expectation = expect_created(&reporter, &db, &Invoice, ExpectConfig::new());
//! db.execute("INSERT INTO invoices (total) VALUES (42)", []).unwrap();
//!
//! let ok = ensure_completion(
//!     reporter.as_ref(),
//!     expectation.as_ref(),
//!     EnsureConfig::new().timeout(Duration::from_secs(5)),
//! );
//! assert!(ok);
//! assert!(!reporter.failed());
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use domain::{Model, Mutation, MutationEvent, MutationHook, MutationStore, StoreError};
use rusqlite::hooks::Action;
use rusqlite::{params, Connection};
use tracing::debug;

/// Default lock timeout for freshly opened instances.
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection string for a named in-memory database that allows multiple
/// clients to access the same instance. Plain `:memory:` cannot be shared.
fn shared_connection_string(name: &str) -> String {
    format!("file:{name}?mode=memory&cache=shared")
}

/// Configuration for [`MemoryDatabase::open`].
///
/// Defaults: anonymous (unshared) instance, foreign keys enforced, 10 second
/// lock timeout.
#[derive(Clone, Debug, Default)]
pub struct MemoryConfig {
    name: Option<String>,
    disable_foreign_keys: bool,
    busy_timeout: Option<Duration>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the instance so repeated `open` calls connect to the same
    /// database rather than a fresh one.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Skip `PRAGMA foreign_keys = ON` (enforced by default).
    pub fn without_foreign_keys(mut self) -> Self {
        self.disable_foreign_keys = true;
        self
    }

    /// Override the default lock timeout. Useful when many writers share a
    /// named instance.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }
}

/// Named post-mutation hooks, shared with the connection's update hook.
#[derive(Default)]
struct HookBoard {
    entries: Mutex<BTreeMap<String, (Mutation, MutationHook)>>,
}

impl HookBoard {
    fn dispatch(&self, action: Action, table: &str, rowid: i64) {
        let mutation = match action {
            Action::SQLITE_INSERT => Mutation::Create,
            Action::SQLITE_UPDATE => Mutation::Update,
            Action::SQLITE_DELETE => Mutation::Delete,
            _ => return,
        };
        let event = MutationEvent {
            mutation,
            table: table.to_string(),
            rowid,
        };
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        for (kind, hook) in entries.values() {
            if *kind == mutation {
                hook(&event);
            }
        }
    }
}

/// Disposable SQLite database running entirely in memory.
///
/// Wraps a single connection behind a mutex so the handle can be shared
/// across threads; registered hooks fire synchronously on whichever thread
/// performs the mutation.
pub struct MemoryDatabase {
    conn: Mutex<Connection>,
    hooks: Arc<HookBoard>,
}

impl MemoryDatabase {
    /// Open an in-memory database per `config`.
    pub fn open(config: MemoryConfig) -> Result<Self, StoreError> {
        let conn = match &config.name {
            Some(name) => Connection::open(shared_connection_string(name)),
            None => Connection::open_in_memory(),
        }
        .map_err(map_sqerr)?;

        if !config.disable_foreign_keys {
            conn.execute_batch("PRAGMA foreign_keys = ON;")
                .map_err(map_sqerr)?;
        }

        // WAL journal mode and a generous lock timeout let concurrent
        // writers on a shared instance queue up instead of failing fast.
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(map_sqerr)?;
        conn.busy_timeout(config.busy_timeout.unwrap_or(DEFAULT_BUSY_TIMEOUT))
            .map_err(map_sqerr)?;

        let hooks = Arc::new(HookBoard::default());
        let board = Arc::clone(&hooks);
        conn.update_hook(Some(
            move |action: Action, _db: &str, table: &str, rowid: i64| {
                board.dispatch(action, table, rowid);
            },
        ));

        debug!(
            "opened in-memory database '{}'",
            config.name.as_deref().unwrap_or(":memory:")
        );

        Ok(Self {
            conn: Mutex::new(conn),
            hooks,
        })
    }

    /// Execute a single SQL statement, returning the number of affected rows.
    pub fn execute(&self, sql: &str, params: impl rusqlite::Params) -> Result<usize, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Backend("mutex poisoned".into()))?;
        conn.execute(sql, params).map_err(map_sqerr)
    }

    /// Execute a batch of SQL statements (DDL, fixtures).
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Backend("mutex poisoned".into()))?;
        conn.execute_batch(sql).map_err(map_sqerr)
    }

    /// Run a query expected to return a single row, mapped through `f`.
    pub fn query_row<T>(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
        f: impl FnOnce(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Backend("mutex poisoned".into()))?;
        conn.query_row(sql, params, f).map_err(map_sqerr)
    }
}

impl MutationStore for MemoryDatabase {
    fn resolve_entity(&self, model: &dyn Model) -> Result<String, StoreError> {
        let table = model.table_name().to_string();
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Backend("mutex poisoned".into()))?;
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
                params![table],
                |row| row.get(0),
            )
            .map_err(map_sqerr)?;
        if !exists {
            return Err(StoreError::UnknownEntity(table));
        }
        Ok(table)
    }

    fn register_hook(
        &self,
        mutation: Mutation,
        name: &str,
        hook: MutationHook,
    ) -> Result<(), StoreError> {
        let mut entries = self
            .hooks
            .entries
            .lock()
            .map_err(|_| StoreError::Backend("mutex poisoned".into()))?;
        if entries.contains_key(name) {
            return Err(StoreError::DuplicateHook(name.to_string()));
        }
        entries.insert(name.to_string(), (mutation, hook));
        debug!("registered {} hook '{}'", mutation.as_str(), name);
        Ok(())
    }
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(format!("sqlite error: {e}"))
}
