//! Realtime session coordinator.
//!
//! Owns the lifecycle of each WebSocket connection: role declaration at join
//! (Unjoined -> Teacher | Student, never changed afterwards), translation of
//! inbound events into lifecycle service calls, and fan-out of the resulting
//! snapshots to the right audience. Every mutating event is wrapped so a
//! failure only produces a scoped `error` event on the originating
//! connection.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    config::{DEFAULT_POLL_DURATION_SECS, SOCKET_HISTORY_LIMIT},
    dto::{
        poll::CreatePollRequest,
        ws::{ClientMessage, ServerMessage},
    },
    error::ServiceError,
    services::{poll_service, student_service, ws_events},
    state::{ClientConnection, Role, SharedState},
};

/// Synthetic identity attached to teacher connections; the role is what
/// matters, teachers carry no real session.
const TEACHER_SESSION_ID: &str = "teacher";
const TEACHER_NAME: &str = "Teacher";
const KICKED_MESSAGE: &str = "You have been removed by the teacher";

/// Handle the full lifecycle of one client WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we
    // await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection_id = Uuid::new_v4();
    info!(%connection_id, "client connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(event) => dispatch(&state, connection_id, &outbound_tx, event).await,
                Err(err) => {
                    warn!(%connection_id, error = %err, "failed to parse client message");
                    ws_events::send_error(&outbound_tx, "malformed message".into());
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    handle_disconnect(&state, connection_id);
    finalize(writer_task, outbound_tx).await;
}

/// Route one inbound event to its handler, converting any failure into a
/// scoped error event for this connection only.
async fn dispatch(
    state: &SharedState,
    connection_id: Uuid,
    tx: &mpsc::UnboundedSender<Message>,
    event: ClientMessage,
) {
    let outcome = match event {
        ClientMessage::TeacherJoin => handle_teacher_join(state, connection_id, tx)
            .await
            .map_err(|err| ("join", err)),
        ClientMessage::StudentJoin { session_id, name } => {
            handle_student_join(state, connection_id, tx, session_id, name)
                .await
                .map_err(|err| ("join", err))
        }
        ClientMessage::PollCreate {
            question,
            options,
            duration,
        } => handle_poll_create(state, connection_id, tx, question, options, duration)
            .await
            .map_err(|err| ("create poll", err)),
        ClientMessage::PollVote { poll_id, option_id } => {
            handle_poll_vote(state, connection_id, tx, poll_id, option_id)
                .await
                .map_err(|err| ("submit vote", err))
        }
        ClientMessage::PollEnd { poll_id } => handle_poll_end(state, connection_id, tx, poll_id)
            .await
            .map_err(|err| ("end poll", err)),
        ClientMessage::GetState => handle_get_state(state, connection_id, tx)
            .await
            .map_err(|err| ("get poll state", err)),
        ClientMessage::GetHistory => handle_get_history(state, tx)
            .await
            .map_err(|err| ("get poll history", err)),
        ClientMessage::StudentKick { session_id } => {
            handle_student_kick(state, connection_id, session_id)
                .await
                .map_err(|err| ("kick student", err))
        }
        ClientMessage::Unknown => Ok(()),
    };

    if let Err((action, err)) = outcome {
        ws_events::send_error(tx, err.client_message(action));
    }
}

/// Register a teacher connection and reply with the current room state.
async fn handle_teacher_join(
    state: &SharedState,
    connection_id: Uuid,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), ServiceError> {
    state.registry().insert(
        connection_id,
        ClientConnection {
            session_id: TEACHER_SESSION_ID.into(),
            name: TEACHER_NAME.into(),
            role: Role::Teacher,
            tx: tx.clone(),
        },
    );

    let poll = poll_service::get_active_poll(state).await?;
    ws_events::send_to_connection(
        tx,
        &ServerMessage::PollState {
            poll,
            has_voted: None,
        },
    );
    ws_events::send_to_connection(
        tx,
        &ServerMessage::StudentsCount {
            count: state.registry().student_count(),
        },
    );
    ws_events::send_to_connection(
        tx,
        &ServerMessage::StudentsList {
            students: state.registry().student_names(),
        },
    );

    info!(%connection_id, "teacher joined");
    Ok(())
}

/// Register a student identity and connection, reply with the current poll
/// state plus the student's voted status, and refresh the teacher rosters.
async fn handle_student_join(
    state: &SharedState,
    connection_id: Uuid,
    tx: &mpsc::UnboundedSender<Message>,
    session_id: String,
    name: String,
) -> Result<(), ServiceError> {
    let student = student_service::register_student(state, session_id, name).await?;

    state.registry().insert(
        connection_id,
        ClientConnection {
            session_id: student.session_id.clone(),
            name: student.name.clone(),
            role: Role::Student,
            tx: tx.clone(),
        },
    );

    // The voted flag covers the returned poll even when it just expired, so
    // a rejoining student still sees which way they voted.
    let poll = poll_service::get_active_poll(state).await?;
    let has_voted = match &poll {
        Some(current) => {
            poll_service::has_student_voted(state, current.id, &student.session_id).await?
        }
        None => false,
    };
    ws_events::send_to_connection(
        tx,
        &ServerMessage::PollState {
            poll,
            has_voted: Some(has_voted),
        },
    );

    ws_events::broadcast_roster(state);
    ws_events::broadcast_to_teachers(
        state,
        &ServerMessage::StudentJoined {
            name: student.name.clone(),
            session_id: student.session_id.clone(),
        },
    );

    info!(%connection_id, session_id = %student.session_id, name = %student.name, "student joined");
    Ok(())
}

/// Teacher-only: create a poll, start its countdown, announce it to everyone.
async fn handle_poll_create(
    state: &SharedState,
    connection_id: Uuid,
    tx: &mpsc::UnboundedSender<Message>,
    question: String,
    options: Vec<String>,
    duration: Option<i64>,
) -> Result<(), ServiceError> {
    if state.registry().role_of(&connection_id) != Some(Role::Teacher) {
        ws_events::send_error(tx, "Only teachers can create polls".into());
        return Ok(());
    }

    let poll = poll_service::create_poll(
        state,
        CreatePollRequest {
            question,
            options,
            duration,
        },
    )
    .await?;

    start_poll_timer(state, poll.id, poll.duration);
    ws_events::broadcast_all(state, &ServerMessage::PollNew { poll });
    Ok(())
}

/// Student-only: record a vote, confirm it to the voter and push fresh
/// results to everyone.
async fn handle_poll_vote(
    state: &SharedState,
    connection_id: Uuid,
    tx: &mpsc::UnboundedSender<Message>,
    poll_id: Uuid,
    option_id: Uuid,
) -> Result<(), ServiceError> {
    // Identity comes from the registry, never from the payload.
    let Some(voter) = state
        .registry()
        .get(&connection_id)
        .filter(|connection| connection.role == Role::Student)
    else {
        ws_events::send_error(tx, "Only students can vote".into());
        return Ok(());
    };

    let poll =
        poll_service::submit_vote(state, poll_id, option_id, voter.session_id, voter.name).await?;

    ws_events::send_to_connection(tx, &ServerMessage::VoteConfirmed { poll: poll.clone() });
    ws_events::broadcast_all(state, &ServerMessage::PollResults { poll });
    Ok(())
}

/// Teacher-only: end a poll early, cancel its countdown, announce the result.
async fn handle_poll_end(
    state: &SharedState,
    connection_id: Uuid,
    tx: &mpsc::UnboundedSender<Message>,
    poll_id: Uuid,
) -> Result<(), ServiceError> {
    if state.registry().role_of(&connection_id) != Some(Role::Teacher) {
        ws_events::send_error(tx, "Only teachers can end polls".into());
        return Ok(());
    }

    let poll = poll_service::end_poll(state, poll_id).await?;
    state.timers().cancel(&poll_id);
    ws_events::broadcast_all(state, &ServerMessage::PollEnded { poll });
    Ok(())
}

/// Reply with the current poll state; includes the caller's voted status
/// when the caller is a registered student.
async fn handle_get_state(
    state: &SharedState,
    connection_id: Uuid,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), ServiceError> {
    let poll = poll_service::get_active_poll(state).await?;

    let caller = state.registry().get(&connection_id);
    let has_voted = match (&poll, caller) {
        (Some(active), Some(connection)) if connection.role == Role::Student => {
            Some(poll_service::has_student_voted(state, active.id, &connection.session_id).await?)
        }
        (None, Some(connection)) if connection.role == Role::Student => Some(false),
        _ => None,
    };

    ws_events::send_to_connection(tx, &ServerMessage::PollState { poll, has_voted });
    Ok(())
}

/// Reply with the most recent ended polls.
async fn handle_get_history(
    state: &SharedState,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), ServiceError> {
    let polls = poll_service::get_poll_history(state, SOCKET_HISTORY_LIMIT).await?;
    ws_events::send_to_connection(tx, &ServerMessage::PollHistory { polls });
    Ok(())
}

/// Teacher-only, silently ignored otherwise: disconnect a student by session
/// id (or display name, since the teacher UI only holds names) and refresh
/// the teacher rosters.
async fn handle_student_kick(
    state: &SharedState,
    connection_id: Uuid,
    target: String,
) -> Result<(), ServiceError> {
    if state.registry().role_of(&connection_id) != Some(Role::Teacher) {
        return Ok(());
    }

    if let Some((target_id, target_connection)) = state.registry().find_student(&target) {
        ws_events::send_to_connection(
            &target_connection.tx,
            &ServerMessage::Kicked {
                message: KICKED_MESSAGE.into(),
            },
        );
        let _ = target_connection.tx.send(Message::Close(None));
        state.registry().remove(&target_id);
        info!(session_id = %target_connection.session_id, name = %target_connection.name, "student kicked");
    }

    ws_events::broadcast_roster(state);
    Ok(())
}

/// Unregister a connection; a departing student updates the teacher rosters.
fn handle_disconnect(state: &SharedState, connection_id: Uuid) {
    let Some(connection) = state.registry().remove(&connection_id) else {
        info!(%connection_id, "client disconnected before joining");
        return;
    };

    info!(%connection_id, name = %connection.name, role = ?connection.role, "client disconnected");
    if connection.role == Role::Student {
        ws_events::broadcast_roster(state);
        ws_events::broadcast_to_teachers(
            state,
            &ServerMessage::StudentLeft {
                name: connection.name,
                session_id: connection.session_id,
            },
        );
    }
}

/// Start the countdown that auto-ends a poll after its voting window.
///
/// Installing through the timer map guarantees at most one countdown per
/// poll; the fired task removes itself before exiting. Polls are independent
/// of the connection that created them, so the task owns a state handle of
/// its own and survives the teacher disconnecting.
pub fn start_poll_timer(state: &SharedState, poll_id: Uuid, duration_secs: i64) {
    let task_state = state.clone();
    let secs = u64::try_from(duration_secs).unwrap_or(DEFAULT_POLL_DURATION_SECS as u64);

    let handle = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(secs)).await;

        match poll_service::end_poll(&task_state, poll_id).await {
            Ok(poll) => {
                info!(%poll_id, "poll auto-ended");
                ws_events::broadcast_all(&task_state, &ServerMessage::PollEnded { poll });
            }
            Err(err) => {
                error!(%poll_id, error = %err, "failed to auto-end poll");
            }
        }
        task_state.timers().discard(&poll_id);
    });

    state.timers().install(poll_id, handle);
}

/// Ensure the writer task winds down before we return from the socket
/// handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::dao::models::{PollOptionRow, PollRow, VoteRow};
    use crate::dao::poll_store::PollStore;
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

    fn join_as(
        state: &SharedState,
        role: Role,
        session_id: &str,
        name: &str,
    ) -> (Uuid, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4();
        state.registry().insert(
            connection_id,
            ClientConnection {
                session_id: session_id.into(),
                name: name.into(),
                role,
                tx,
            },
        );
        (connection_id, rx)
    }

    fn drain_events(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<serde_json::Value> {
        let mut events = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let Message::Text(text) = message {
                events.push(serde_json::from_str(&text).unwrap());
            }
        }
        events
    }

    #[tokio::test]
    async fn students_cannot_create_polls() {
        let state = state_with_store().await;
        let (student_id, mut rx) = join_as(&state, Role::Student, "s1", "Ada");
        let tx = state.registry().get(&student_id).unwrap().tx;

        handle_poll_create(
            &state,
            student_id,
            &tx,
            "Pick one".into(),
            vec!["A".into(), "B".into()],
            Some(30),
        )
        .await
        .unwrap();

        let events = drain_events(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["type"], "error");
        assert!(poll_service::get_active_poll(&state).await.unwrap().is_none());
        assert_eq!(state.timers().pending(), 0);
    }

    #[tokio::test]
    async fn create_broadcasts_to_all_and_starts_the_countdown() {
        let state = state_with_store().await;
        let (teacher_id, mut teacher_rx) = join_as(&state, Role::Teacher, "teacher", "Teacher");
        let (_, mut student_rx) = join_as(&state, Role::Student, "s1", "Ada");
        let tx = state.registry().get(&teacher_id).unwrap().tx;

        handle_poll_create(
            &state,
            teacher_id,
            &tx,
            "Pick one".into(),
            vec!["A".into(), "B".into()],
            Some(30),
        )
        .await
        .unwrap();

        for rx in [&mut teacher_rx, &mut student_rx] {
            let events = drain_events(rx);
            assert!(events.iter().any(|event| event["type"] == "poll:new"));
        }
        assert_eq!(state.timers().pending(), 1);
    }

    #[tokio::test]
    async fn vote_confirms_to_voter_and_updates_everyone() {
        let state = state_with_store().await;
        let (teacher_id, mut teacher_rx) = join_as(&state, Role::Teacher, "teacher", "Teacher");
        let (student_id, mut student_rx) = join_as(&state, Role::Student, "s1", "Ada");
        let teacher_tx = state.registry().get(&teacher_id).unwrap().tx;
        let student_tx = state.registry().get(&student_id).unwrap().tx;

        handle_poll_create(
            &state,
            teacher_id,
            &teacher_tx,
            "Pick one".into(),
            vec!["A".into(), "B".into()],
            Some(30),
        )
        .await
        .unwrap();
        let poll = poll_service::get_active_poll(&state).await.unwrap().unwrap();

        handle_poll_vote(&state, student_id, &student_tx, poll.id, poll.options[0].id)
            .await
            .unwrap();

        let student_events = drain_events(&mut student_rx);
        assert!(
            student_events
                .iter()
                .any(|event| event["type"] == "vote:confirmed")
        );
        assert!(
            student_events
                .iter()
                .any(|event| event["type"] == "poll:results")
        );
        let teacher_events = drain_events(&mut teacher_rx);
        assert!(
            teacher_events
                .iter()
                .any(|event| event["type"] == "poll:results"
                    && event["poll"]["totalVotes"] == 1)
        );
    }

    #[tokio::test]
    async fn duplicate_vote_errors_only_the_voter() {
        let state = state_with_store().await;
        let (teacher_id, mut teacher_rx) = join_as(&state, Role::Teacher, "teacher", "Teacher");
        let (student_id, mut student_rx) = join_as(&state, Role::Student, "s1", "Ada");
        let teacher_tx = state.registry().get(&teacher_id).unwrap().tx;
        let student_tx = state.registry().get(&student_id).unwrap().tx;

        handle_poll_create(
            &state,
            teacher_id,
            &teacher_tx,
            "Pick one".into(),
            vec!["A".into(), "B".into()],
            Some(30),
        )
        .await
        .unwrap();
        let poll = poll_service::get_active_poll(&state).await.unwrap().unwrap();

        handle_poll_vote(&state, student_id, &student_tx, poll.id, poll.options[0].id)
            .await
            .unwrap();
        drain_events(&mut student_rx);
        drain_events(&mut teacher_rx);

        // The dispatch wrapper turns the service error into a scoped event.
        dispatch(
            &state,
            student_id,
            &student_tx,
            ClientMessage::PollVote {
                poll_id: poll.id,
                option_id: poll.options[1].id,
            },
        )
        .await;

        let student_events = drain_events(&mut student_rx);
        assert!(student_events.iter().any(|event| event["type"] == "error"
            && event["message"]
                .as_str()
                .unwrap()
                .contains("already voted")));
        assert!(drain_events(&mut teacher_rx).is_empty());
    }

    #[tokio::test]
    async fn manual_end_cancels_the_countdown() {
        let state = state_with_store().await;
        let (teacher_id, mut teacher_rx) = join_as(&state, Role::Teacher, "teacher", "Teacher");
        let teacher_tx = state.registry().get(&teacher_id).unwrap().tx;

        handle_poll_create(
            &state,
            teacher_id,
            &teacher_tx,
            "Pick one".into(),
            vec!["A".into(), "B".into()],
            Some(30),
        )
        .await
        .unwrap();
        let poll = poll_service::get_active_poll(&state).await.unwrap().unwrap();
        assert_eq!(state.timers().pending(), 1);

        handle_poll_end(&state, teacher_id, &teacher_tx, poll.id)
            .await
            .unwrap();

        assert_eq!(state.timers().pending(), 0);
        let events = drain_events(&mut teacher_rx);
        assert!(events.iter().any(|event| event["type"] == "poll:ended"
            && event["poll"]["isActive"] == false));
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_ends_the_poll_and_broadcasts() {
        let state = state_with_store().await;
        let (_, mut student_rx) = join_as(&state, Role::Student, "s1", "Ada");

        let poll = poll_service::create_poll(
            &state,
            CreatePollRequest {
                question: "Pick one".into(),
                options: vec!["A".into(), "B".into()],
                duration: Some(30),
            },
        )
        .await
        .unwrap();
        start_poll_timer(&state, poll.id, poll.duration);
        // Let the countdown task register its sleep before the clock jumps.
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(31)).await;
        tokio::time::sleep(Duration::from_millis(1)).await;

        let events = drain_events(&mut student_rx);
        assert!(events.iter().any(|event| event["type"] == "poll:ended"));
        assert_eq!(state.timers().pending(), 0);
        let history = poll_service::get_poll_history(&state, 10).await.unwrap();
        assert!(history.iter().any(|entry| entry.id == poll.id));
    }

    #[tokio::test]
    async fn kick_removes_the_student_and_refreshes_rosters() {
        let state = state_with_store().await;
        let (teacher_id, mut teacher_rx) = join_as(&state, Role::Teacher, "teacher", "Teacher");
        let (_, mut student_rx) = join_as(&state, Role::Student, "s1", "Ada");

        handle_student_kick(&state, teacher_id, "s1".into())
            .await
            .unwrap();

        let student_events = drain_events(&mut student_rx);
        assert!(student_events.iter().any(|event| event["type"] == "kicked"));
        assert_eq!(state.registry().student_count(), 0);

        let teacher_events = drain_events(&mut teacher_rx);
        assert!(teacher_events.iter().any(|event| {
            event["type"] == "students:list"
                && event["students"].as_array().unwrap().is_empty()
        }));
    }

    #[tokio::test]
    async fn kick_from_a_student_is_silently_ignored() {
        let state = state_with_store().await;
        let (student_a, _rx_a) = join_as(&state, Role::Student, "s1", "Ada");
        let (_, mut rx_b) = join_as(&state, Role::Student, "s2", "Grace");

        handle_student_kick(&state, student_a, "s2".into())
            .await
            .unwrap();

        assert_eq!(state.registry().student_count(), 2);
        assert!(drain_events(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn disconnecting_student_notifies_teachers() {
        let state = state_with_store().await;
        let (_teacher_id, mut teacher_rx) = join_as(&state, Role::Teacher, "teacher", "Teacher");
        let (student_id, _student_rx) = join_as(&state, Role::Student, "s1", "Ada");

        handle_disconnect(&state, student_id);

        let events = drain_events(&mut teacher_rx);
        assert!(events.iter().any(|event| event["type"] == "student:left"
            && event["sessionId"] == "s1"));
        assert!(events.iter().any(|event| event["type"] == "students:count"
            && event["count"] == 0));
    }

    #[tokio::test]
    async fn joining_student_sees_their_vote_on_a_just_expired_poll() {
        let state = AppState::new();
        let store = MemoryPollStore::new();
        state.install_poll_store(Arc::new(store.clone())).await;

        // A stored-active poll whose window already passed, voted on by the
        // rejoining student.
        let now = chrono::Utc::now();
        let poll = PollRow {
            id: Uuid::new_v4(),
            question: "stale".into(),
            duration: 30,
            end_time: now - chrono::Duration::seconds(5),
            is_active: true,
            created_at: now - chrono::Duration::seconds(35),
        };
        let option = PollOptionRow {
            id: Uuid::new_v4(),
            poll_id: poll.id,
            text: "A".into(),
        };
        store
            .insert_poll(poll.clone(), vec![option.clone()])
            .await
            .unwrap();
        store
            .insert_vote(VoteRow {
                id: Uuid::new_v4(),
                poll_id: poll.id,
                option_id: option.id,
                student_id: "s1".into(),
                student_name: "Ada".into(),
            })
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        handle_student_join(&state, Uuid::new_v4(), &tx, "s1".into(), "Ada".into())
            .await
            .unwrap();

        let events = drain_events(&mut rx);
        let poll_state = events
            .iter()
            .find(|event| event["type"] == "poll:state")
            .unwrap();
        assert_eq!(poll_state["poll"]["isActive"], false);
        assert_eq!(poll_state["hasVoted"], true);
    }
}
