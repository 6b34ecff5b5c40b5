//! Domain logic for the syncwatch test orchestrator.
//!
//! Everything in this crate is transport-agnostic: run and result models,
//! framework strategies, the cancellable subprocess runner, result parsing
//! and sync-issue analysis. The `api` crate wires these into the
//! orchestrator, the notification hub and the HTTP surface.

pub mod analyzer;
pub mod error;
pub mod execution;
pub mod framework;
pub mod messages;
pub mod parser;
pub mod run;
pub mod types;
