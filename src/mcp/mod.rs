//! MCP (Model Context Protocol) server over stdio.

pub mod handlers;
pub mod protocol;
pub mod server;
