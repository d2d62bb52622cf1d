use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::oneshot;

mod migrations;

use migrations::run_migrations;

use crate::models::{LogEntry, LogEvent};
use crate::timer::{Phase, SessionState};

/// Storage key for the single persisted `SessionState` blob.
const STATE_KEY: &str = "session";

/// Hard cap on the session trail; oldest entries are dropped first.
const MAX_LOG_ENTRIES: u32 = 1000;

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

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid datetime '{value}': {err}"))
}

fn event_from_str(value: &str) -> Result<LogEvent> {
    match value {
        "focusStart" => Ok(LogEvent::FocusStart),
        "focusEnd" => Ok(LogEvent::FocusEnd),
        "breakStart" => Ok(LogEvent::BreakStart),
        "breakEnd" => Ok(LogEvent::BreakEnd),
        "sessionReset" => Ok(LogEvent::SessionReset),
        _ => Err(anyhow!("unknown log event '{value}'")),
    }
}

fn phase_from_str(value: &str) -> Result<Phase> {
    match value {
        "ready" => Ok(Phase::Ready),
        "focus" => Ok(Phase::Focus),
        "break" => Ok(Phase::Break),
        "focusEnded" => Ok(Phase::FocusEnded),
        "breakEnded" => Ok(Phase::BreakEnded),
        _ => Err(anyhow!("unknown phase '{value}'")),
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> Result<LogEntry> {
    Ok(LogEntry {
        timestamp: parse_datetime(&row.get::<_, String>(0)?)?,
        event: event_from_str(&row.get::<_, String>(1)?)?,
        session_id: row.get(2)?,
        planned_minutes: row.get(3)?,
        actual_start: row
            .get::<_, Option<String>>(4)?
            .map(|s| parse_datetime(&s))
            .transpose()?,
        actual_minutes: row.get(5)?,
        remaining_secs: row.get(6)?,
        phase: row
            .get::<_, Option<String>>(7)?
            .map(|s| phase_from_str(&s))
            .transpose()?,
    })
}

/// SQLite access serialized through a dedicated worker thread. Callers
/// submit closures over the connection and await the reply, so the async
/// runtime never blocks on disk I/O.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("tomoro-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
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
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
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
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    /// Persist the whole `SessionState` under its single key.
    pub async fn save_state(&self, state: &SessionState) -> Result<()> {
        let blob = serde_json::to_string(state).context("failed to serialize session state")?;
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO controller_state (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![STATE_KEY, blob],
            )
            .with_context(|| "failed to save session state")?;
            Ok(())
        })
        .await
    }

    pub async fn load_state(&self) -> Result<Option<SessionState>> {
        self.execute(|conn| {
            let blob: Option<String> = conn
                .query_row(
                    "SELECT value FROM controller_state WHERE key = ?1",
                    params![STATE_KEY],
                    |row| row.get(0),
                )
                .optional()
                .with_context(|| "failed to load session state")?;

            blob.map(|value| {
                serde_json::from_str(&value).context("failed to deserialize session state")
            })
            .transpose()
        })
        .await
    }

    /// Append one trail entry and enforce the cap in the same turn:
    /// everything older than the most recent `MAX_LOG_ENTRIES` rows goes.
    pub async fn append_log(&self, entry: &LogEntry) -> Result<()> {
        let record = entry.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO event_log
                 (timestamp, event, session_id, planned_minutes, actual_start, actual_minutes, remaining_secs, phase)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.timestamp.to_rfc3339(),
                    record.event.as_str(),
                    record.session_id,
                    record.planned_minutes,
                    record
                        .actual_start
                        .as_ref()
                        .map(|dt| dt.to_rfc3339()),
                    record.actual_minutes,
                    record.remaining_secs,
                    record.phase.map(|p| p.as_str()),
                ],
            )
            .with_context(|| "failed to insert log entry")?;

            conn.execute(
                "DELETE FROM event_log
                 WHERE id NOT IN (SELECT id FROM event_log ORDER BY id DESC LIMIT ?1)",
                params![MAX_LOG_ENTRIES],
            )
            .with_context(|| "failed to trim log trail")?;

            Ok(())
        })
        .await
    }

    /// The whole trail, oldest first.
    pub async fn log_entries(&self) -> Result<Vec<LogEntry>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT timestamp, event, session_id, planned_minutes, actual_start, actual_minutes, remaining_secs, phase
                 FROM event_log
                 ORDER BY id ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                entries.push(row_to_entry(row)?);
            }

            Ok(entries)
        })
        .await
    }

    pub async fn log_count(&self) -> Result<u32> {
        self.execute(|conn| {
            conn.query_row("SELECT COUNT(*) FROM event_log", [], |row| row.get(0))
                .with_context(|| "failed to count log entries")
        })
        .await
    }
}
