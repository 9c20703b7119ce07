use crate::data::error::{DataError, DataResult};
use rusqlite::Connection;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task;
use tracing::{error, info, instrument, trace};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the users database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    File(PathBuf),
    Memory,
}

impl DataSource {
    /// Accepts a plain path, a `sqlite://` URL or `:memory:`.
    pub fn from_url(url: &str) -> Self {
        let path = url.strip_prefix("sqlite://").unwrap_or(url);
        if path == ":memory:" {
            DataSource::Memory
        } else {
            DataSource::File(PathBuf::from(path))
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::File(path) => write!(f, "{}", path.display()),
            DataSource::Memory => write!(f, ":memory:"),
        }
    }
}

/// Process-wide holder of the single database connection.
///
/// Work against the connection goes through [`DbConnectionManager::run`], which
/// executes it on the blocking thread pool so a busy database never stalls the
/// async workers. The lock is released when the closure returns.
pub struct DbConnectionManager {
    source: DataSource,
    connection: Arc<Mutex<Connection>>,
}

impl DbConnectionManager {
    #[instrument(skip(source), fields(source = %source))]
    pub fn open(source: DataSource) -> DataResult<Self> {
        let started_at = Instant::now();
        info!("Opening database connection");

        let connection = match &source {
            DataSource::File(path) => Connection::open(path),
            DataSource::Memory => Connection::open_in_memory(),
        }
        .and_then(|conn| conn.busy_timeout(BUSY_TIMEOUT).map(|()| conn))
        .map_err(|e| {
            error!(
                error = %e,
                duration_ms = started_at.elapsed().as_millis(),
                "Failed to open database connection"
            );
            e
        })?;

        info!(
            duration_ms = started_at.elapsed().as_millis(),
            "Database connection opened"
        );
        Ok(Self {
            source,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    /// Runs `operation` with exclusive access to the connection on a blocking thread.
    pub async fn run<T, F>(&self, operation: F) -> DataResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> DataResult<T> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        task::spawn_blocking(move || {
            trace!("Acquiring database connection");
            let conn = connection
                .lock()
                .map_err(|_| DataError::ConnectionPoisoned)?;
            operation(&conn)
        })
        .await?
    }
}
