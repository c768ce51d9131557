use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Poll row as persisted, without its options or votes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct PollRow {
    /// Stable identifier for the poll.
    pub id: Uuid,
    /// Question text shown to students.
    pub question: String,
    /// Voting window length in seconds.
    pub duration: i64,
    /// Instant at which the poll stops accepting votes.
    pub end_time: DateTime<Utc>,
    /// Stored active flag. Advisory only: a poll past `end_time` is treated
    /// as ended regardless of this flag.
    pub is_active: bool,
    /// Creation timestamp, also the history ordering key.
    pub created_at: DateTime<Utc>,
}

/// One selectable choice belonging to a poll. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct PollOptionRow {
    /// Stable identifier, used as the vote target.
    pub id: Uuid,
    /// Owning poll.
    pub poll_id: Uuid,
    /// Display text.
    pub text: String,
}

/// A single student's vote. Immutable, never deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct VoteRow {
    /// Stable identifier for the vote.
    pub id: Uuid,
    /// Poll the vote belongs to.
    pub poll_id: Uuid,
    /// Chosen option.
    pub option_id: Uuid,
    /// Session id of the voting student.
    pub student_id: String,
    /// Display name denormalized at vote time.
    pub student_name: String,
}

/// Registered student identity keyed by a client-generated session id.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct StudentRow {
    /// Stable identifier.
    pub id: Uuid,
    /// Client-generated session id, unique per student.
    pub session_id: String,
    /// Display name, updated when the same session rejoins under a new name.
    pub name: String,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
}

/// A poll together with its options and votes, as loaded from the store.
///
/// This is the unit every read operation returns; result aggregation is
/// computed from it by the lifecycle service, never by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollBundle {
    /// The poll row itself.
    pub poll: PollRow,
    /// Options in creation order.
    pub options: Vec<PollOptionRow>,
    /// Every vote cast on the poll.
    pub votes: Vec<VoteRow>,
}
