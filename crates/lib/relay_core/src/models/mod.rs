//! Domain models.
//!
//! These are internal domain models, distinct from the API response models in
//! `relay_api` (which have `#[serde(rename_all = "camelCase")]`).

pub mod auth;
pub mod event;
pub mod installation;
pub mod run;
