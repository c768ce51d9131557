//! Persistence abstraction for polls, votes and student identities.

pub mod memory;
#[cfg(feature = "postgres-store")]
pub mod postgres;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{PollBundle, PollOptionRow, PollRow, StudentRow, VoteRow};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for polls and students.
///
/// Implementations must persist a poll and its options atomically in
/// `insert_poll`, and enforce uniqueness of `(poll_id, student_id)` in
/// `insert_vote` by failing with [`StorageError::Duplicate`].
///
/// [`StorageError::Duplicate`]: crate::dao::storage::StorageError::Duplicate
pub trait PollStore: Send + Sync {
    /// Persist a new poll with its options as one atomic unit.
    fn insert_poll(
        &self,
        poll: PollRow,
        options: Vec<PollOptionRow>,
    ) -> BoxFuture<'static, StorageResult<PollBundle>>;
    /// Load a poll with its options and votes.
    fn find_poll(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PollBundle>>>;
    /// Most recently created poll whose stored active flag is still set,
    /// regardless of expiry. Expiry resolution belongs to the service layer.
    fn find_latest_active(&self) -> BoxFuture<'static, StorageResult<Option<PollBundle>>>;
    /// Clear the active flag on a poll and return its fresh bundle.
    /// Succeeds (and is a no-op) when the flag is already cleared.
    fn mark_inactive(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PollBundle>>>;
    /// Record a vote. Fails with `Duplicate` when the student already voted
    /// on this poll.
    fn insert_vote(&self, vote: VoteRow) -> BoxFuture<'static, StorageResult<()>>;
    /// Look up an existing vote by `(poll_id, student_id)`.
    fn find_vote(
        &self,
        poll_id: Uuid,
        student_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<VoteRow>>>;
    /// Ended polls, newest first, capped at `limit`.
    fn list_ended(&self, limit: i64) -> BoxFuture<'static, StorageResult<Vec<PollBundle>>>;
    /// Insert or update a student identity keyed by session id.
    fn upsert_student(
        &self,
        session_id: String,
        name: String,
    ) -> BoxFuture<'static, StorageResult<StudentRow>>;
    /// Registered students, newest first, capped at `limit`.
    fn list_students(&self, limit: i64) -> BoxFuture<'static, StorageResult<Vec<StudentRow>>>;
    /// Delete a student by id. Deleting an unknown id is not an error.
    fn delete_student(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap connectivity probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
