//! Streams HTML documents whose Suspense boundaries resolve after the shell
//! has been sent. Resolved boundaries are appended as insertion scripts that
//! replace their `data-suspense-fallback` placeholders in place.

pub mod error;
pub mod server;
pub mod suspense;

pub use error::StreamError;
pub use server::middleware::SuspenseLayer;
pub use suspense::{
    BoundaryId, BoundaryResolver, ReadyChunk, StreamMultiplexer, SuspenseCoordinator,
    SuspenseHooks,
};
