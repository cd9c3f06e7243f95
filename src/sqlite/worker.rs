use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use rusqlite::types::Value;
use tokio::sync::oneshot;
use tracing::debug;

use super::query::{QueryOutcome, parameter_names, run_cached};
use crate::error::SqlSessionError;

/// `SQLite` connection owned by a dedicated worker thread.
///
/// rusqlite calls block, so every operation is shipped to the thread that owns
/// the connection and answered over a oneshot channel.
pub(crate) struct SqliteWorker {
    sender: Sender<Command>,
    label: String,
    /// Connection autocommit mode, refreshed before every reply.
    autocommit: Arc<AtomicBool>,
}

impl SqliteWorker {
    pub(crate) fn spawn(conn: rusqlite::Connection, label: &str) -> Result<Self, SqlSessionError> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let autocommit = Arc::new(AtomicBool::new(conn.is_autocommit()));
        let shared = Arc::clone(&autocommit);
        thread::Builder::new()
            .name(format!("sqlite-worker-{label}"))
            .spawn(move || run_sqlite_worker(conn, &receiver, &shared))
            .map_err(|err| {
                SqlSessionError::ConnectionError(format!(
                    "failed to spawn SQLite worker thread: {err}"
                ))
            })?;
        Ok(Self {
            sender,
            label: label.to_string(),
            autocommit,
        })
    }

    /// True while the connection is inside a transaction, however it was opened.
    pub(crate) fn in_transaction(&self) -> bool {
        !self.autocommit.load(Ordering::Acquire)
    }

    fn send_command(&self, command: Command) -> Result<(), SqlSessionError> {
        self.sender
            .send(command)
            .map_err(|_| SqlSessionError::ConnectionError("SQLite worker closed".into()))
    }

    /// Send the command built around a fresh reply channel and await the reply.
    async fn request<T>(
        &self,
        action: &str,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SqlSessionError> {
        let (tx, rx) = oneshot::channel();
        self.send_command(command(tx))?;
        rx.await.map_err(|_| dropped(action))?
    }

    /// Parameter names `SQLite` sees in `sql`, by index.
    pub(crate) async fn prepare(
        &self,
        sql: Arc<String>,
    ) -> Result<Vec<Option<String>>, SqlSessionError> {
        self.request("preparing a statement", |respond_to| Command::Prepare {
            sql,
            respond_to,
        })
        .await
    }

    pub(crate) async fn run(
        &self,
        sql: Arc<String>,
        params: Vec<Value>,
    ) -> Result<QueryOutcome, SqlSessionError> {
        self.request("running a statement", |respond_to| Command::Run {
            sql,
            params,
            respond_to,
        })
        .await
    }

    pub(crate) async fn execute_batch(&self, sql: &str) -> Result<(), SqlSessionError> {
        let sql = sql.to_string();
        self.request("executing a batch", |respond_to| Command::ExecuteBatch {
            sql,
            respond_to,
        })
        .await
    }

    /// Run synchronous rusqlite logic on the worker-owned connection.
    pub(crate) async fn with_connection<F, R>(&self, func: F) -> Result<R, SqlSessionError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlSessionError> + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let callback: BoxedCallback =
            Box::new(move |conn| func(conn).map(|value| Box::new(value) as Box<dyn Any + Send>));
        self.send_command(Command::WithConnection {
            callback,
            respond_to: tx,
        })?;
        match rx.await {
            Ok(Ok(payload)) => payload.downcast::<R>().map(|boxed| *boxed).map_err(|_| {
                SqlSessionError::ExecutionError("SQLite worker response downcast failure".into())
            }),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(dropped("handling a callback")),
        }
    }

    /// Stop the worker and wait until the connection is closed.
    pub(crate) async fn shutdown(&self) -> Result<(), SqlSessionError> {
        self.request("shutting down", |respond_to| Command::Shutdown {
            respond_to: Some(respond_to),
        })
        .await
    }
}

impl std::fmt::Debug for SqliteWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteWorker")
            .field("label", &self.label)
            .finish()
    }
}

impl Drop for SqliteWorker {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown { respond_to: None });
    }
}

fn dropped(action: &str) -> SqlSessionError {
    SqlSessionError::ConnectionError(format!("SQLite worker dropped while {action}"))
}

type Reply<T> = oneshot::Sender<Result<T, SqlSessionError>>;
type BoxedResponse = Result<Box<dyn Any + Send>, SqlSessionError>;
type BoxedCallback = Box<dyn FnOnce(&mut rusqlite::Connection) -> BoxedResponse + Send>;

enum Command {
    Prepare {
        sql: Arc<String>,
        respond_to: Reply<Vec<Option<String>>>,
    },
    Run {
        sql: Arc<String>,
        params: Vec<Value>,
        respond_to: Reply<QueryOutcome>,
    },
    ExecuteBatch {
        sql: String,
        respond_to: Reply<()>,
    },
    WithConnection {
        callback: BoxedCallback,
        respond_to: oneshot::Sender<BoxedResponse>,
    },
    Shutdown {
        respond_to: Option<Reply<()>>,
    },
}

fn run_sqlite_worker(
    mut conn: rusqlite::Connection,
    receiver: &Receiver<Command>,
    autocommit: &AtomicBool,
) {
    // Statements like BEGIN, or SQLite's own rollback after an error, change
    // the mode; the flag must be current before the caller sees the reply.
    let refresh = |conn: &rusqlite::Connection| {
        autocommit.store(conn.is_autocommit(), Ordering::Release);
    };
    while let Ok(command) = receiver.recv() {
        match command {
            Command::Prepare { sql, respond_to } => {
                let _ = respond_to.send(parameter_names(&conn, &sql));
            }
            Command::Run {
                sql,
                params,
                respond_to,
            } => {
                let outcome = run_cached(&conn, &sql, &params);
                refresh(&conn);
                let _ = respond_to.send(outcome);
            }
            Command::ExecuteBatch { sql, respond_to } => {
                let outcome = conn.execute_batch(&sql).map_err(SqlSessionError::from);
                refresh(&conn);
                let _ = respond_to.send(outcome);
            }
            Command::WithConnection {
                callback,
                respond_to,
            } => {
                let outcome = callback(&mut conn);
                refresh(&conn);
                let _ = respond_to.send(outcome);
            }
            Command::Shutdown { respond_to } => {
                let outcome = conn
                    .close()
                    .map_err(|(_, err)| SqlSessionError::SqliteError(err));
                autocommit.store(true, Ordering::Release);
                debug!("sqlite worker stopped");
                if let Some(respond_to) = respond_to {
                    let _ = respond_to.send(outcome);
                }
                return;
            }
        }
    }
}
