use sqlx::Error as SqlxError;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for Postgres backend operations.
pub type PgResult<T> = std::result::Result<T, PgDaoError>;

/// Failure while talking to Postgres, one variant per operation.
#[derive(Debug, Error)]
pub enum PgDaoError {
    #[error("failed to connect to Postgres")]
    Connect {
        #[source]
        source: SqlxError,
    },
    #[error("failed to ensure schema for table `{table}`")]
    EnsureSchema {
        table: &'static str,
        #[source]
        source: SqlxError,
    },
    #[error("failed to save poll `{id}`")]
    SavePoll {
        id: Uuid,
        #[source]
        source: SqlxError,
    },
    #[error("failed to load poll `{id}`")]
    LoadPoll {
        id: Uuid,
        #[source]
        source: SqlxError,
    },
    #[error("failed to look up the active poll")]
    FindActivePoll {
        #[source]
        source: SqlxError,
    },
    #[error("failed to list ended polls")]
    ListPolls {
        #[source]
        source: SqlxError,
    },
    #[error("failed to save vote for poll `{poll_id}`")]
    SaveVote {
        poll_id: Uuid,
        #[source]
        source: SqlxError,
    },
    #[error("failed to load vote for poll `{poll_id}`")]
    LoadVote {
        poll_id: Uuid,
        #[source]
        source: SqlxError,
    },
    #[error("failed to save student `{session_id}`")]
    SaveStudent {
        session_id: String,
        #[source]
        source: SqlxError,
    },
    #[error("failed to list students")]
    ListStudents {
        #[source]
        source: SqlxError,
    },
    #[error("failed to delete student `{id}`")]
    DeleteStudent {
        id: Uuid,
        #[source]
        source: SqlxError,
    },
    #[error("Postgres ping health check failed")]
    HealthPing {
        #[source]
        source: SqlxError,
    },
}

impl PgDaoError {
    fn source_sqlx(&self) -> &SqlxError {
        match self {
            PgDaoError::Connect { source }
            | PgDaoError::EnsureSchema { source, .. }
            | PgDaoError::SavePoll { source, .. }
            | PgDaoError::LoadPoll { source, .. }
            | PgDaoError::FindActivePoll { source }
            | PgDaoError::ListPolls { source }
            | PgDaoError::SaveVote { source, .. }
            | PgDaoError::LoadVote { source, .. }
            | PgDaoError::SaveStudent { source, .. }
            | PgDaoError::ListStudents { source }
            | PgDaoError::DeleteStudent { source, .. }
            | PgDaoError::HealthPing { source } => source,
        }
    }

    /// Whether the underlying database error is a unique-constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        self.source_sqlx()
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation())
    }
}
