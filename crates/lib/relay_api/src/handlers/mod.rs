//! Request handlers.

pub mod installations;
pub mod webhooks;
