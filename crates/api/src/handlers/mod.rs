//! Request handlers for the HTTP API.
//!
//! Handlers delegate to the [`RunOrchestrator`](crate::engine::RunOrchestrator)
//! and map errors via [`AppError`](crate::error::AppError).

pub mod runs;
