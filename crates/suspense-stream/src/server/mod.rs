pub mod config;
pub mod core;
pub mod handlers;
pub mod middleware;
pub mod rendering;
pub mod types;

pub use core::Server;
pub use types::*;
