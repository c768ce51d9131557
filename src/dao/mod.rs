//! Persistence layer: row models, the [`PollStore`](poll_store::PollStore)
//! abstraction and its backends.

pub mod models;
pub mod poll_store;
pub mod storage;
