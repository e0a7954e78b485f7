//! MCP tool modules.
//!
//! Tools are grouped by domain: keyword lookups, domain lookups, the chunked
//! analysis pipeline, and contextual help.

pub mod analysis;
pub mod domains;
pub mod keywords;
mod context;
