use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dto::validation::validate_options;

/// Payload used to create a new poll.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreatePollRequest {
    /// Question text shown to students.
    #[validate(length(min = 1, message = "question is required"))]
    pub question: String,
    /// Selectable answers, at least two.
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    /// Voting window in seconds, at most one day; defaults to 60 when
    /// omitted.
    #[serde(default)]
    #[validate(range(
        min = 1,
        max = 86_400,
        message = "duration must be between 1 and 86400 seconds"
    ))]
    pub duration: Option<i64>,
}

/// Vote submission over the HTTP facade. The realtime channel derives the
/// student identity from the connection registry instead.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    /// Targeted poll.
    pub poll_id: Uuid,
    /// Chosen option.
    pub option_id: Uuid,
    /// Session id of the voting student.
    #[validate(length(min = 1, message = "studentId is required"))]
    pub student_id: String,
    /// Display name recorded alongside the vote.
    #[validate(length(min = 1, message = "studentName is required"))]
    pub student_name: String,
}

/// Per-option tallies inside a [`PollSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OptionResult {
    /// Option identifier, the vote target.
    pub id: Uuid,
    /// Display text.
    pub text: String,
    /// Number of votes cast for this option.
    pub vote_count: usize,
    /// `round(voteCount / totalVotes * 100)`, 0 when nobody voted yet.
    pub percentage: u32,
}

/// Computed, point-in-time view of a poll with its results.
///
/// The only poll shape ever sent to clients, over HTTP and the socket alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PollSnapshot {
    /// Poll identifier.
    pub id: Uuid,
    /// Question text.
    pub question: String,
    /// Voting window in seconds.
    pub duration: i64,
    /// Instant the poll stops accepting votes.
    pub end_time: DateTime<Utc>,
    /// Effective activeness: stored flag AND remaining time > 0, so a
    /// snapshot never reports an expired poll as active.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Options with their tallies, in creation order.
    pub options: Vec<OptionResult>,
    /// Total votes across all options.
    pub total_votes: usize,
    /// Seconds left before the poll ends, clamped at 0.
    pub remaining_time: i64,
}

/// Envelope for `GET /polls/active`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActivePollResponse {
    /// Currently active poll, if any.
    pub poll: Option<PollSnapshot>,
}

/// Envelope for poll history responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    /// Ended polls, newest first.
    pub polls: Vec<PollSnapshot>,
}

/// Envelope for the voted-status check.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VotedResponse {
    /// Whether the student already voted on the poll.
    pub has_voted: bool,
}

/// Query parameters for `GET /polls/history`.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct HistoryQuery {
    /// Maximum number of polls to return (default 10).
    pub limit: Option<i64>,
}
