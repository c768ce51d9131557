//! Wire shapes exchanged with HTTP and WebSocket clients.

pub mod health;
pub mod poll;
pub mod student;
pub mod validation;
pub mod ws;
