//! Model Context Protocol surface: JSON-RPC dispatch, tools and transports.

pub mod protocol;
pub mod server;
pub mod tools;
pub mod transport;

pub use server::McpServer;
pub use transport::{serve_stdio, serve_tcp};
