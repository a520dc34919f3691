use axum::body::Body;
use axum::http::header::CONTENT_LENGTH;
use axum::http::response::Parts;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use crate::error::StreamError;

/// Re-attaches a rewritten body to the status and headers of the response it
/// replaces.
pub struct StreamingHtmlResponse {
    parts: Parts,
    stream: Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>,
}

impl StreamingHtmlResponse {
    pub fn new<S>(parts: Parts, stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, StreamError>> + Send + 'static,
    {
        Self { parts, stream: Box::pin(stream) }
    }
}

impl IntoResponse for StreamingHtmlResponse {
    fn into_response(self) -> Response {
        let client_connected = Arc::new(AtomicBool::new(true));

        let stream = self.stream.map(move |chunk| {
            chunk.inspect_err(|e| {
                if matches!(e, StreamError::Disconnected(_, _))
                    && client_connected.swap(false, Ordering::Relaxed)
                {
                    warn!("Client disconnected during streaming: {}", e);
                }
            })
        });

        let mut parts = self.parts;
        // The body length changes once out-of-band chunks are appended.
        parts.headers.remove(CONTENT_LENGTH);

        Response::from_parts(parts, Body::from_stream(stream))
    }
}
