//! Chat-bot interface: the relay platform's update envelope, the HTTP client
//! driving its API, and the per-chat conversation engine.

pub mod api;
pub mod conversation;
pub mod types;
