use chrono::Utc;
use futures::future::BoxFuture;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use super::error::{PgDaoError, PgResult};
use crate::dao::{
    models::{PollBundle, PollOptionRow, PollRow, StudentRow, VoteRow},
    poll_store::PollStore,
    storage::StorageResult,
};

/// Schema statements executed on connect. `IF NOT EXISTS` keeps them
/// idempotent across restarts; the vote and student unique indexes are the
/// constraints the lifecycle service relies on.
const SCHEMA: &[(&str, &str)] = &[
    (
        "polls",
        "CREATE TABLE IF NOT EXISTS polls (
            id UUID PRIMARY KEY,
            question TEXT NOT NULL,
            duration BIGINT NOT NULL,
            end_time TIMESTAMPTZ NOT NULL,
            is_active BOOLEAN NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        )",
    ),
    (
        "poll_options",
        "CREATE TABLE IF NOT EXISTS poll_options (
            id UUID PRIMARY KEY,
            poll_id UUID NOT NULL REFERENCES polls(id),
            text TEXT NOT NULL
        )",
    ),
    (
        "votes",
        "CREATE TABLE IF NOT EXISTS votes (
            id UUID PRIMARY KEY,
            poll_id UUID NOT NULL REFERENCES polls(id),
            option_id UUID NOT NULL REFERENCES poll_options(id),
            student_id TEXT NOT NULL,
            student_name TEXT NOT NULL,
            UNIQUE (poll_id, student_id)
        )",
    ),
    (
        "students",
        "CREATE TABLE IF NOT EXISTS students (
            id UUID PRIMARY KEY,
            session_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        )",
    ),
];

/// Postgres implementation of [`PollStore`] over a shared connection pool.
#[derive(Clone)]
pub struct PostgresPollStore {
    pool: PgPool,
}

impl PostgresPollStore {
    /// Connect to Postgres and ensure the schema is present.
    pub async fn connect(database_url: &str) -> PgResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|source| PgDaoError::Connect { source })?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> PgResult<()> {
        for &(table, statement) in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|source| PgDaoError::EnsureSchema { table, source })?;
        }
        Ok(())
    }

    async fn load_bundle_parts(&self, poll: PollRow) -> PgResult<PollBundle> {
        let id = poll.id;
        let options = sqlx::query_as::<_, PollOptionRow>(
            "SELECT id, poll_id, text FROM poll_options WHERE poll_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|source| PgDaoError::LoadPoll { id, source })?;

        let votes = sqlx::query_as::<_, VoteRow>(
            "SELECT id, poll_id, option_id, student_id, student_name FROM votes WHERE poll_id = $1",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|source| PgDaoError::LoadPoll { id, source })?;

        Ok(PollBundle {
            poll,
            options,
            votes,
        })
    }

    async fn insert_poll(
        &self,
        poll: PollRow,
        options: Vec<PollOptionRow>,
    ) -> PgResult<PollBundle> {
        let id = poll.id;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|source| PgDaoError::SavePoll { id, source })?;

        sqlx::query(
            "INSERT INTO polls (id, question, duration, end_time, is_active, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(poll.id)
        .bind(&poll.question)
        .bind(poll.duration)
        .bind(poll.end_time)
        .bind(poll.is_active)
        .bind(poll.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|source| PgDaoError::SavePoll { id, source })?;

        for option in &options {
            sqlx::query("INSERT INTO poll_options (id, poll_id, text) VALUES ($1, $2, $3)")
                .bind(option.id)
                .bind(option.poll_id)
                .bind(&option.text)
                .execute(&mut *tx)
                .await
                .map_err(|source| PgDaoError::SavePoll { id, source })?;
        }

        tx.commit()
            .await
            .map_err(|source| PgDaoError::SavePoll { id, source })?;

        Ok(PollBundle {
            poll,
            options,
            votes: Vec::new(),
        })
    }

    async fn find_poll(&self, id: Uuid) -> PgResult<Option<PollBundle>> {
        let poll = sqlx::query_as::<_, PollRow>(
            "SELECT id, question, duration, end_time, is_active, created_at
             FROM polls WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|source| PgDaoError::LoadPoll { id, source })?;

        match poll {
            Some(poll) => Ok(Some(self.load_bundle_parts(poll).await?)),
            None => Ok(None),
        }
    }

    async fn find_latest_active(&self) -> PgResult<Option<PollBundle>> {
        let poll = sqlx::query_as::<_, PollRow>(
            "SELECT id, question, duration, end_time, is_active, created_at
             FROM polls WHERE is_active ORDER BY created_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|source| PgDaoError::FindActivePoll { source })?;

        match poll {
            Some(poll) => Ok(Some(self.load_bundle_parts(poll).await?)),
            None => Ok(None),
        }
    }

    async fn mark_inactive(&self, id: Uuid) -> PgResult<Option<PollBundle>> {
        sqlx::query("UPDATE polls SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|source| PgDaoError::SavePoll { id, source })?;

        self.find_poll(id).await
    }

    async fn insert_vote(&self, vote: VoteRow) -> PgResult<()> {
        sqlx::query(
            "INSERT INTO votes (id, poll_id, option_id, student_id, student_name)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(vote.id)
        .bind(vote.poll_id)
        .bind(vote.option_id)
        .bind(&vote.student_id)
        .bind(&vote.student_name)
        .execute(&self.pool)
        .await
        .map_err(|source| PgDaoError::SaveVote {
            poll_id: vote.poll_id,
            source,
        })?;

        Ok(())
    }

    async fn find_vote(&self, poll_id: Uuid, student_id: String) -> PgResult<Option<VoteRow>> {
        sqlx::query_as::<_, VoteRow>(
            "SELECT id, poll_id, option_id, student_id, student_name
             FROM votes WHERE poll_id = $1 AND student_id = $2",
        )
        .bind(poll_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|source| PgDaoError::LoadVote { poll_id, source })
    }

    async fn list_ended(&self, limit: i64) -> PgResult<Vec<PollBundle>> {
        let polls = sqlx::query_as::<_, PollRow>(
            "SELECT id, question, duration, end_time, is_active, created_at
             FROM polls WHERE NOT is_active ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|source| PgDaoError::ListPolls { source })?;

        let mut bundles = Vec::with_capacity(polls.len());
        for poll in polls {
            bundles.push(self.load_bundle_parts(poll).await?);
        }
        Ok(bundles)
    }

    async fn upsert_student(&self, session_id: String, name: String) -> PgResult<StudentRow> {
        sqlx::query_as::<_, StudentRow>(
            "INSERT INTO students (id, session_id, name, created_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (session_id) DO UPDATE SET name = EXCLUDED.name
             RETURNING id, session_id, name, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(&session_id)
        .bind(&name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|source| PgDaoError::SaveStudent {
            session_id,
            source,
        })
    }

    async fn list_students(&self, limit: i64) -> PgResult<Vec<StudentRow>> {
        sqlx::query_as::<_, StudentRow>(
            "SELECT id, session_id, name, created_at
             FROM students ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|source| PgDaoError::ListStudents { source })
    }

    async fn delete_student(&self, id: Uuid) -> PgResult<()> {
        sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|source| PgDaoError::DeleteStudent { id, source })?;
        Ok(())
    }

    async fn ping(&self) -> PgResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|source| PgDaoError::HealthPing { source })?;
        Ok(())
    }
}

impl PollStore for PostgresPollStore {
    fn insert_poll(
        &self,
        poll: PollRow,
        options: Vec<PollOptionRow>,
    ) -> BoxFuture<'static, StorageResult<PollBundle>> {
        let store = self.clone();
        Box::pin(async move { store.insert_poll(poll, options).await.map_err(Into::into) })
    }

    fn find_poll(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PollBundle>>> {
        let store = self.clone();
        Box::pin(async move { store.find_poll(id).await.map_err(Into::into) })
    }

    fn find_latest_active(&self) -> BoxFuture<'static, StorageResult<Option<PollBundle>>> {
        let store = self.clone();
        Box::pin(async move { store.find_latest_active().await.map_err(Into::into) })
    }

    fn mark_inactive(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PollBundle>>> {
        let store = self.clone();
        Box::pin(async move { store.mark_inactive(id).await.map_err(Into::into) })
    }

    fn insert_vote(&self, vote: VoteRow) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_vote(vote).await.map_err(Into::into) })
    }

    fn find_vote(
        &self,
        poll_id: Uuid,
        student_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<VoteRow>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_vote(poll_id, student_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_ended(&self, limit: i64) -> BoxFuture<'static, StorageResult<Vec<PollBundle>>> {
        let store = self.clone();
        Box::pin(async move { store.list_ended(limit).await.map_err(Into::into) })
    }

    fn upsert_student(
        &self,
        session_id: String,
        name: String,
    ) -> BoxFuture<'static, StorageResult<StudentRow>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upsert_student(session_id, name)
                .await
                .map_err(Into::into)
        })
    }

    fn list_students(&self, limit: i64) -> BoxFuture<'static, StorageResult<Vec<StudentRow>>> {
        let store = self.clone();
        Box::pin(async move { store.list_students(limit).await.map_err(Into::into) })
    }

    fn delete_student(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.delete_student(id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }
}
