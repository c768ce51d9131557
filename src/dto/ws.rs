use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::poll::PollSnapshot;

/// Messages accepted from WebSocket clients.
///
/// The `type` tag carries the event name; payload fields are camelCase to
/// match the browser clients.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// A teacher announces itself; no payload.
    #[serde(rename = "teacher:join")]
    TeacherJoin,
    /// A student joins with its stable session id and display name.
    #[serde(rename = "student:join", rename_all = "camelCase")]
    StudentJoin {
        /// Client-generated session id, stable across refreshes.
        session_id: String,
        /// Display name.
        name: String,
    },
    /// Teacher creates a poll.
    #[serde(rename = "poll:create")]
    PollCreate {
        /// Question text.
        question: String,
        /// Selectable answers.
        options: Vec<String>,
        /// Voting window in seconds; defaults to 60 when omitted.
        #[serde(default)]
        duration: Option<i64>,
    },
    /// Student casts a vote.
    #[serde(rename = "poll:vote", rename_all = "camelCase")]
    PollVote {
        /// Targeted poll.
        poll_id: Uuid,
        /// Chosen option.
        option_id: Uuid,
    },
    /// Teacher ends a poll early.
    #[serde(rename = "poll:end", rename_all = "camelCase")]
    PollEnd {
        /// Poll to end.
        poll_id: Uuid,
    },
    /// Any client asks for the current poll state (reconnection path).
    #[serde(rename = "poll:getState")]
    GetState,
    /// Any client asks for recent ended polls.
    #[serde(rename = "poll:getHistory")]
    GetHistory,
    /// Teacher removes a student by session id (or display name fallback).
    #[serde(rename = "student:kick", rename_all = "camelCase")]
    StudentKick {
        /// Session id, or display name when the UI only knows the name.
        session_id: String,
    },
    /// Anything unrecognized; ignored by the handler.
    #[serde(other)]
    Unknown,
}

/// Messages pushed to WebSocket clients.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Current poll state, with the caller's voted flag when known.
    #[serde(rename = "poll:state", rename_all = "camelCase")]
    PollState {
        /// Active poll snapshot, if any.
        poll: Option<PollSnapshot>,
        /// Whether the receiving student already voted; omitted for teachers.
        #[serde(skip_serializing_if = "Option::is_none")]
        has_voted: Option<bool>,
    },
    /// A new poll just opened.
    #[serde(rename = "poll:new")]
    PollNew {
        /// The freshly created poll.
        poll: PollSnapshot,
    },
    /// Updated tallies after a vote.
    #[serde(rename = "poll:results")]
    PollResults {
        /// Recomputed snapshot.
        poll: PollSnapshot,
    },
    /// The poll stopped accepting votes (timer or teacher action).
    #[serde(rename = "poll:ended")]
    PollEnded {
        /// Final snapshot.
        poll: PollSnapshot,
    },
    /// The caller's vote was recorded.
    #[serde(rename = "vote:confirmed")]
    VoteConfirmed {
        /// Snapshot including the caller's vote.
        poll: PollSnapshot,
    },
    /// Number of connected students, for teachers.
    #[serde(rename = "students:count")]
    StudentsCount {
        /// Connected student count.
        count: usize,
    },
    /// Display names of connected students, for teachers.
    #[serde(rename = "students:list")]
    StudentsList {
        /// Connected student names.
        students: Vec<String>,
    },
    /// A student joined, for teachers.
    #[serde(rename = "student:joined", rename_all = "camelCase")]
    StudentJoined {
        /// Display name.
        name: String,
        /// Session id.
        session_id: String,
    },
    /// A student disconnected, for teachers.
    #[serde(rename = "student:left", rename_all = "camelCase")]
    StudentLeft {
        /// Display name.
        name: String,
        /// Session id.
        session_id: String,
    },
    /// Recent ended polls.
    #[serde(rename = "poll:history")]
    PollHistory {
        /// Ended polls, newest first.
        polls: Vec<PollSnapshot>,
    },
    /// Scoped failure notification for the originating connection only.
    #[serde(rename = "error")]
    Error {
        /// Client-safe message.
        message: String,
    },
    /// Sent right before the server closes a kicked connection.
    #[serde(rename = "kicked")]
    Kicked {
        /// Human-readable reason.
        message: String,
    },
}
