//! In-memory [`PollStore`] backend.
//!
//! Backs unit tests and database-free local runs. Mirrors the constraints the
//! Postgres backend gets from its schema: atomic poll+options insertion and
//! the unique `(poll_id, student_id)` vote index.

use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::dao::models::{PollBundle, PollOptionRow, PollRow, StudentRow, VoteRow};
use crate::dao::poll_store::PollStore;
use crate::dao::storage::{StorageError, StorageResult};

#[derive(Default)]
struct Inner {
    polls: Vec<PollRow>,
    options: Vec<PollOptionRow>,
    votes: Vec<VoteRow>,
    students: Vec<StudentRow>,
}

impl Inner {
    fn bundle(&self, poll: &PollRow) -> PollBundle {
        PollBundle {
            poll: poll.clone(),
            options: self
                .options
                .iter()
                .filter(|option| option.poll_id == poll.id)
                .cloned()
                .collect(),
            votes: self
                .votes
                .iter()
                .filter(|vote| vote.poll_id == poll.id)
                .cloned()
                .collect(),
        }
    }
}

/// Process-local poll store holding everything in vectors behind a mutex.
#[derive(Clone, Default)]
pub struct MemoryPollStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryPollStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PollStore for MemoryPollStore {
    fn insert_poll(
        &self,
        poll: PollRow,
        options: Vec<PollOptionRow>,
    ) -> BoxFuture<'static, StorageResult<PollBundle>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.lock().await;
            guard.polls.push(poll.clone());
            guard.options.extend(options);
            Ok(guard.bundle(&poll))
        })
    }

    fn find_poll(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PollBundle>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.lock().await;
            Ok(guard
                .polls
                .iter()
                .find(|poll| poll.id == id)
                .map(|poll| guard.bundle(poll)))
        })
    }

    fn find_latest_active(&self) -> BoxFuture<'static, StorageResult<Option<PollBundle>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.lock().await;
            Ok(guard
                .polls
                .iter()
                .filter(|poll| poll.is_active)
                .max_by_key(|poll| poll.created_at)
                .map(|poll| guard.bundle(poll)))
        })
    }

    fn mark_inactive(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PollBundle>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.lock().await;
            let Some(index) = guard.polls.iter().position(|poll| poll.id == id) else {
                return Ok(None);
            };
            guard.polls[index].is_active = false;
            let poll = guard.polls[index].clone();
            Ok(Some(guard.bundle(&poll)))
        })
    }

    fn insert_vote(&self, vote: VoteRow) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.lock().await;
            let taken = guard
                .votes
                .iter()
                .any(|existing| existing.poll_id == vote.poll_id && existing.student_id == vote.student_id);
            if taken {
                return Err(StorageError::Duplicate(format!(
                    "vote ({}, {})",
                    vote.poll_id, vote.student_id
                )));
            }
            guard.votes.push(vote);
            Ok(())
        })
    }

    fn find_vote(
        &self,
        poll_id: Uuid,
        student_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<VoteRow>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.lock().await;
            Ok(guard
                .votes
                .iter()
                .find(|vote| vote.poll_id == poll_id && vote.student_id == student_id)
                .cloned())
        })
    }

    fn list_ended(&self, limit: i64) -> BoxFuture<'static, StorageResult<Vec<PollBundle>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.lock().await;
            let mut ended: Vec<&PollRow> = guard
                .polls
                .iter()
                .filter(|poll| !poll.is_active)
                .collect();
            ended.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(ended
                .into_iter()
                .take(limit.max(0) as usize)
                .map(|poll| guard.bundle(poll))
                .collect())
        })
    }

    fn upsert_student(
        &self,
        session_id: String,
        name: String,
    ) -> BoxFuture<'static, StorageResult<StudentRow>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.lock().await;
            if let Some(existing) = guard
                .students
                .iter_mut()
                .find(|student| student.session_id == session_id)
            {
                if existing.name != name {
                    existing.name = name;
                }
                return Ok(existing.clone());
            }
            let student = StudentRow {
                id: Uuid::new_v4(),
                session_id,
                name,
                created_at: Utc::now(),
            };
            guard.students.push(student.clone());
            Ok(student)
        })
    }

    fn list_students(&self, limit: i64) -> BoxFuture<'static, StorageResult<Vec<StudentRow>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.lock().await;
            let mut students: Vec<StudentRow> = guard.students.clone();
            students.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            students.truncate(limit.max(0) as usize);
            Ok(students)
        })
    }

    fn delete_student(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.lock().await;
            guard.students.retain(|student| student.id != id);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
