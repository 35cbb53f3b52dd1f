#![deny(warnings)]
#![recursion_limit = "256"]

// Library crate for fops-mcp

pub mod config;
pub mod error;
pub mod logging;
pub mod operations;
pub mod server;
pub mod tools;
pub mod transport;
