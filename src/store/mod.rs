//! SQLite-backed store for clinicians, patients, sessions and samples.
//!
//! All access goes through one connection owned by a dedicated thread.
//! Callers submit closures with [`Database::execute`] or
//! [`Database::transaction`] and await the result, so every logical
//! operation commits or rolls back as a unit.

use std::{
    path::PathBuf,
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::core::SessionError;

mod helpers;
mod migrations;
pub mod models;
pub mod repositories;

pub use models::{Clinician, Patient, SampleRecord, SessionRecord};

use migrations::run_migrations;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

/// Where the database lives.
#[derive(Debug, Clone, PartialEq)]
pub enum DbTarget {
    Memory,
    File(PathBuf),
}

impl DbTarget {
    /// Parse a connection string: `sqlite://path`, `sqlite:path`, a plain
    /// path, or `:memory:`.
    pub fn parse(url: &str) -> Result<Self, SessionError> {
        let trimmed = url.trim();
        let rest = trimmed
            .strip_prefix("sqlite://")
            .or_else(|| trimmed.strip_prefix("sqlite:"))
            .unwrap_or(trimmed);

        if rest.is_empty() {
            return Err(SessionError::Store("empty database url".to_string()));
        }
        if rest.contains("://") {
            return Err(SessionError::Store(format!(
                "unsupported database url '{trimmed}', expected sqlite://<path>"
            )));
        }
        if rest == ":memory:" {
            return Ok(DbTarget::Memory);
        }
        Ok(DbTarget::File(PathBuf::from(rest)))
    }

    fn describe(&self) -> String {
        match self {
            DbTarget::Memory => ":memory:".to_string(),
            DbTarget::File(path) => path.display().to_string(),
        }
    }

    fn open(&self) -> rusqlite::Result<Connection> {
        match self {
            DbTarget::Memory => Connection::open_in_memory(),
            DbTarget::File(path) => Connection::open(path),
        }
    }
}

#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    /// Open the database named by a connection string and run migrations.
    pub fn connect(url: &str) -> Result<Self, SessionError> {
        Self::new(DbTarget::parse(url)?)
    }

    /// Private in-memory database, used by tests and `--database-url :memory:`.
    pub fn open_in_memory() -> Result<Self, SessionError> {
        Self::new(DbTarget::Memory)
    }

    pub fn new(target: DbTarget) -> Result<Self, SessionError> {
        if let DbTarget::File(path) = &target {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SessionError::Store(format!(
                        "failed to create database directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), SessionError>>();
        let target_for_thread = target.clone();

        let worker = thread::Builder::new()
            .name("gaitvision-db".into())
            .spawn(move || {
                let mut conn = match target_for_thread.open() {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(SessionError::Store(format!(
                            "failed to open SQLite database: {err}"
                        ))));
                        return;
                    }
                };

                if let DbTarget::File(_) = target_for_thread {
                    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                        error!("Failed to enable WAL mode: {err}");
                    }
                }
                if let Err(err) = conn.pragma_update(None, "foreign_keys", "ON") {
                    error!("Failed to enable foreign keys: {err}");
                }

                let init_result = run_migrations(&mut conn).map_err(|err| {
                    SessionError::Store(format!("failed to run database migrations: {err:#}"))
                });
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .map_err(|e| SessionError::Store(format!("failed to spawn database thread: {e}")))?;

        ready_rx.recv().map_err(|_| {
            SessionError::Store("database worker exited before signaling readiness".to_string())
        })??;

        info!("Database initialized at {}", target.describe());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
        })
    }

    /// Run `task` on the database thread.
    pub async fn execute<F, T>(&self, task: F) -> Result<T, SessionError>
    where
        F: FnOnce(&mut Connection) -> Result<T, SessionError> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| SessionError::Store(format!("failed to send command to DB thread: {err}")))?;

        reply_rx
            .await
            .map_err(|_| SessionError::Store("database thread terminated unexpectedly".to_string()))?
    }

    /// Run `task` inside one transaction; any error rolls everything back.
    pub async fn transaction<F, T>(&self, task: F) -> Result<T, SessionError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, SessionError> + Send + 'static,
        T: Send + 'static,
    {
        self.execute(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let output = task(&tx)?;
            tx.commit()?;
            Ok(output)
        })
        .await
    }
}
