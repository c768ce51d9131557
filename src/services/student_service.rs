//! Student identity registry, independent of any poll.

use tracing::info;
use uuid::Uuid;

use crate::{
    config::STUDENT_LIST_LIMIT, dto::student::StudentInfo, error::ServiceError, state::SharedState,
};

/// Upsert a student identity keyed by session id.
///
/// A session rejoining under a new name gets its display name updated.
pub async fn register_student(
    state: &SharedState,
    session_id: String,
    name: String,
) -> Result<StudentInfo, ServiceError> {
    if session_id.trim().is_empty() || name.trim().is_empty() {
        return Err(ServiceError::Validation(
            "session id and name are required".into(),
        ));
    }

    let store = state.require_poll_store().await?;
    let student = store.upsert_student(session_id, name).await?;
    info!(session_id = %student.session_id, name = %student.name, "student registered");
    Ok(student.into())
}

/// The most recently registered students, capped at 100.
pub async fn get_all_students(state: &SharedState) -> Result<Vec<StudentInfo>, ServiceError> {
    let store = state.require_poll_store().await?;
    let students = store.list_students(STUDENT_LIST_LIMIT).await?;
    Ok(students.into_iter().map(Into::into).collect())
}

/// Delete a student record. Best-effort: an unknown id is not an error.
pub async fn remove_student(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_poll_store().await?;
    store.delete_student(id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::dao::poll_store::memory::MemoryPollStore;
    use crate::state::AppState;

    use super::*;

    async fn state_with_store() -> SharedState {
        let state = AppState::new();
        state
            .install_poll_store(Arc::new(MemoryPollStore::new()))
            .await;
        state
    }

    #[tokio::test]
    async fn rejoining_session_updates_the_name() {
        let state = state_with_store().await;
        let first = register_student(&state, "session-1".into(), "Ada".into())
            .await
            .unwrap();
        let second = register_student(&state, "session-1".into(), "Grace".into())
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Grace");
        assert_eq!(get_all_students(&state).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blank_identities_are_rejected() {
        let state = state_with_store().await;
        let err = register_student(&state, " ".into(), "Ada".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn remove_is_best_effort() {
        let state = state_with_store().await;
        let student = register_student(&state, "session-1".into(), "Ada".into())
            .await
            .unwrap();

        remove_student(&state, student.id).await.unwrap();
        assert!(get_all_students(&state).await.unwrap().is_empty());
        // Removing the same id again is a no-op.
        remove_student(&state, student.id).await.unwrap();
    }
}
