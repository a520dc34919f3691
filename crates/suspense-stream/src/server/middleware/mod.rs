pub mod suspense_middleware;

pub use suspense_middleware::{SuspenseLayer, SuspenseMiddleware, rewrite_response};
