use crate::jobs::JobId;
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error};


/// query used to resolve the `all` job selection
pub const SQL_ALL_JOB_IDS: &str = "select Id from JobModels order by Id asc";

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("The job database {0:?} does not exist")]
    MissingDatabase(PathBuf),
    #[error("SQLite query failed")]
    SQLite(#[from] rusqlite::Error),
    #[error("Job table contains a negative id: {0}")]
    InvalidJobId(i64),
}

/// Ensure the database path points to an existing file
pub fn ensure_exists(path: &Path) -> Result<(), ConnectionError> {
    if path.is_file() {
        Ok(())
    } else {
        error!(path = ?path, "The provided database does not exist");

        Err(ConnectionError::MissingDatabase(path.to_path_buf()))
    }
}

/// Read only access to the simulation job database
#[derive(Debug)]
pub struct JobDatabase {
    connection: Connection,
}

impl JobDatabase {
    pub fn open(path: &Path) -> Result<Self, ConnectionError> {
        ensure_exists(path)?;

        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        debug!(path = ?path, "Opened job database");

        Ok(Self { connection })
    }

    /// every job id known to the database in ascending order
    pub fn job_ids(&self) -> Result<Vec<JobId>, ConnectionError> {
        self.connection
            .prepare_cached(SQL_ALL_JOB_IDS)?
            .query_map(params![], |row| row.get::<_, i64>(0))?
            .try_fold(Vec::new(), |mut init, result| {
                let id = result?;
                init.push(JobId::try_from(id).map_err(|_| ConnectionError::InvalidJobId(id))?);

                Ok::<Vec<JobId>, ConnectionError>(init)
            })
    }
}
