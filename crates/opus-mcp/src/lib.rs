//! `opus-mcp` crate (library surface).
//!
//! The primary entrypoint is the `opus-mcp` binary (MCP over stdio or streamable HTTP).
//! This module re-exports the building blocks for embedding.

pub use opus_core as core;
pub use opus_local as local;
