//! Cache administration MCP tools.
//!
//! These talk to the interception layer over its control channel.

pub mod clear;
pub mod status;

pub use clear::{CacheClearEndpointParams, clear_endpoint_impl, clear_impl};
pub use status::status_impl;
