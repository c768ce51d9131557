use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::DEFAULT_HISTORY_LIMIT,
    dto::poll::{
        ActivePollResponse, CreatePollRequest, HistoryQuery, HistoryResponse, PollSnapshot,
        VoteRequest, VotedResponse,
    },
    error::AppError,
    services::poll_service,
    state::SharedState,
};

/// Routes exposing the poll lifecycle over plain HTTP.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/polls", post(create_poll))
        .route("/polls/active", get(get_active_poll))
        .route("/polls/history", get(get_poll_history))
        .route("/polls/vote", post(submit_vote))
        .route("/polls/{id}", get(get_poll_by_id))
        .route("/polls/{id}/end", post(end_poll))
        .route("/polls/{poll_id}/voted/{student_id}", get(check_vote))
}

/// Create a new poll; only one unexpired poll may be active at a time.
#[utoipa::path(
    post,
    path = "/polls",
    tag = "polls",
    request_body = CreatePollRequest,
    responses(
        (status = 201, description = "Poll created", body = PollSnapshot),
        (status = 400, description = "Invalid payload or a poll is already active")
    )
)]
pub async fn create_poll(
    State(state): State<SharedState>,
    Json(payload): Json<CreatePollRequest>,
) -> Result<(StatusCode, Json<PollSnapshot>), AppError> {
    let poll = poll_service::create_poll(&state, payload)
        .await
        .map_err(|err| AppError::from_service(err, "create poll"))?;
    Ok((StatusCode::CREATED, Json(poll)))
}

/// Return the currently active poll, if any, with live results.
#[utoipa::path(
    get,
    path = "/polls/active",
    tag = "polls",
    responses((status = 200, description = "Active poll or null", body = ActivePollResponse))
)]
pub async fn get_active_poll(
    State(state): State<SharedState>,
) -> Result<Json<ActivePollResponse>, AppError> {
    let poll = poll_service::get_active_poll(&state)
        .await
        .map_err(|err| AppError::from_service(err, "get active poll"))?;
    Ok(Json(ActivePollResponse { poll }))
}

/// Return the most recent ended polls, newest first.
#[utoipa::path(
    get,
    path = "/polls/history",
    tag = "polls",
    params(HistoryQuery),
    responses((status = 200, description = "Ended polls", body = HistoryResponse))
)]
pub async fn get_poll_history(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).max(1);
    let polls = poll_service::get_poll_history(&state, limit)
        .await
        .map_err(|err| AppError::from_service(err, "get poll history"))?;
    Ok(Json(HistoryResponse { polls }))
}

/// Look up one poll by id.
#[utoipa::path(
    get,
    path = "/polls/{id}",
    tag = "polls",
    params(("id" = Uuid, Path, description = "Poll identifier")),
    responses(
        (status = 200, description = "Poll found", body = PollSnapshot),
        (status = 404, description = "Unknown poll")
    )
)]
pub async fn get_poll_by_id(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PollSnapshot>, AppError> {
    let poll = poll_service::get_poll_by_id(&state, id)
        .await
        .map_err(|err| AppError::from_service(err, "get poll"))?
        .ok_or_else(|| AppError::NotFound("poll not found".into()))?;
    Ok(Json(poll))
}

/// Record a vote on behalf of a student and return the refreshed results.
#[utoipa::path(
    post,
    path = "/polls/vote",
    tag = "polls",
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Vote recorded", body = PollSnapshot),
        (status = 400, description = "Ended poll, foreign option or duplicate vote"),
        (status = 404, description = "Unknown poll")
    )
)]
pub async fn submit_vote(
    State(state): State<SharedState>,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<PollSnapshot>, AppError> {
    payload.validate()?;
    let poll = poll_service::submit_vote(
        &state,
        payload.poll_id,
        payload.option_id,
        payload.student_id,
        payload.student_name,
    )
    .await
    .map_err(|err| AppError::from_service(err, "submit vote"))?;
    Ok(Json(poll))
}

/// Check whether a student has already voted on a poll.
#[utoipa::path(
    get,
    path = "/polls/{poll_id}/voted/{student_id}",
    tag = "polls",
    params(
        ("poll_id" = Uuid, Path, description = "Poll identifier"),
        ("student_id" = String, Path, description = "Session id of the student")
    ),
    responses((status = 200, description = "Voted status", body = VotedResponse))
)]
pub async fn check_vote(
    State(state): State<SharedState>,
    Path((poll_id, student_id)): Path<(Uuid, String)>,
) -> Result<Json<VotedResponse>, AppError> {
    let has_voted = poll_service::has_student_voted(&state, poll_id, &student_id)
        .await
        .map_err(|err| AppError::from_service(err, "check vote"))?;
    Ok(Json(VotedResponse { has_voted }))
}

/// End a poll ahead of its countdown. Idempotent.
#[utoipa::path(
    post,
    path = "/polls/{id}/end",
    tag = "polls",
    params(("id" = Uuid, Path, description = "Poll identifier")),
    responses(
        (status = 200, description = "Poll ended", body = PollSnapshot),
        (status = 404, description = "Unknown poll")
    )
)]
pub async fn end_poll(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PollSnapshot>, AppError> {
    let poll = poll_service::end_poll(&state, id)
        .await
        .map_err(|err| AppError::from_service(err, "end poll"))?;
    state.timers().cancel(&id);
    Ok(Json(poll))
}
