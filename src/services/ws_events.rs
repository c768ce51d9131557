//! Fan-out helpers for the realtime channel: caller-only replies,
//! teacher-only notifications and broadcast-all pushes.

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::warn;

use crate::{dto::ws::ServerMessage, state::SharedState};

/// Serialize a server message and queue it on one connection's writer.
///
/// A closed writer is ignored: the connection's own task is already tearing
/// down and will unregister itself.
pub fn send_to_connection(tx: &mpsc::UnboundedSender<Message>, message: &ServerMessage) {
    let payload = match serde_json::to_string(message) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize server message `{message:?}`");
            return;
        }
    };
    let _ = tx.send(Message::Text(payload.into()));
}

/// Push a message to every joined connection, teachers and students alike.
pub fn broadcast_all(state: &SharedState, message: &ServerMessage) {
    for tx in state.registry().all_senders() {
        send_to_connection(&tx, message);
    }
}

/// Push a message to every teacher connection.
pub fn broadcast_to_teachers(state: &SharedState, message: &ServerMessage) {
    for tx in state.registry().teacher_senders() {
        send_to_connection(&tx, message);
    }
}

/// Refresh the student count and name list on every teacher connection.
pub fn broadcast_roster(state: &SharedState) {
    broadcast_to_teachers(
        state,
        &ServerMessage::StudentsCount {
            count: state.registry().student_count(),
        },
    );
    broadcast_to_teachers(
        state,
        &ServerMessage::StudentsList {
            students: state.registry().student_names(),
        },
    );
}

/// Scoped failure notification to the originating connection only.
pub fn send_error(tx: &mpsc::UnboundedSender<Message>, message: String) {
    send_to_connection(tx, &ServerMessage::Error { message });
}
