use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the live polling backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
        crate::routes::polls::create_poll,
        crate::routes::polls::get_active_poll,
        crate::routes::polls::get_poll_history,
        crate::routes::polls::get_poll_by_id,
        crate::routes::polls::submit_vote,
        crate::routes::polls::check_vote,
        crate::routes::polls::end_poll,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::poll::CreatePollRequest,
            crate::dto::poll::VoteRequest,
            crate::dto::poll::PollSnapshot,
            crate::dto::poll::OptionResult,
            crate::dto::poll::ActivePollResponse,
            crate::dto::poll::HistoryResponse,
            crate::dto::poll::VotedResponse,
            crate::dto::student::StudentInfo,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "polls", description = "Poll lifecycle and voting endpoints"),
        (name = "realtime", description = "WebSocket channel for live sessions"),
    )
)]
pub struct ApiDoc;
