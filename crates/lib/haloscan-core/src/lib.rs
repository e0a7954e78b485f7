//! Core services for haloscan-mcp.
//!
//! This crate owns the authenticated upstream client, the chunked analysis
//! pipeline (planner, sequential executor, budgeted synthesizer) and the
//! control plane both transport adapters call into.

pub mod client;
pub mod control;
mod params;
pub mod parsers;
pub mod validate;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use client::{ClientConfig, ClientError, HaloscanClient, Payload, SeoApi};
pub use control::{AnalysisControlPlane, ControlConfig, ControlError};
