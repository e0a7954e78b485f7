//! Analysis models and upstream schema helpers for haloscan-mcp.
//!
//! This crate defines the data model shared by the planner, executor,
//! synthesizer and both transport adapters.

pub mod models;
pub mod schema;
pub mod target;

pub use models::*;
pub use target::{AnalysisTarget, InvalidTargetError};
