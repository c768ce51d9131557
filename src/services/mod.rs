/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Poll lifecycle: creation, voting, expiry, history.
pub mod poll_service;
/// WebSocket connection and message handling service.
pub mod socket_service;
/// Student identity registry operations.
pub mod student_service;
/// Realtime event fan-out helpers.
pub mod ws_events;
