use axum::{extract::Request, http::header::CONTENT_TYPE, response::IntoResponse, response::Response};
use futures::StreamExt;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{Instrument, debug};

use crate::error::StreamError;
use crate::server::config::StreamingConfig;
use crate::server::rendering::streaming_response::StreamingHtmlResponse;
use crate::suspense::{OutOfBandReceiver, StreamMultiplexer, SuspenseCoordinator};

/// Gives every request its own [`SuspenseCoordinator`] (as a request
/// extension) and rewrites HTML responses so boundaries resolved after the
/// handler returned are streamed in after the document.
#[derive(Clone)]
pub struct SuspenseLayer {
    config: Arc<StreamingConfig>,
}

impl SuspenseLayer {
    pub fn new(config: StreamingConfig) -> Self {
        Self { config: Arc::new(config) }
    }
}

impl Default for SuspenseLayer {
    fn default() -> Self {
        Self::new(StreamingConfig::default())
    }
}

impl<S> Layer<S> for SuspenseLayer {
    type Service = SuspenseMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SuspenseMiddleware { inner, config: Arc::clone(&self.config) }
    }
}

#[derive(Clone)]
pub struct SuspenseMiddleware<S> {
    inner: S,
    config: Arc<StreamingConfig>,
}

impl<S> Service<Request> for SuspenseMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static + Clone,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        let config = Arc::clone(&self.config);
        let inner = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, inner);

        Box::pin(async move {
            if !config.enabled {
                return inner.call(request).await;
            }

            let (coordinator, receiver) = SuspenseCoordinator::new();
            let span = tracing::info_span!(
                "suspense_stream",
                request_id = %coordinator.request_id(),
                path = %request.uri().path(),
            );

            request.extensions_mut().insert(coordinator.clone());

            async move {
                let response = inner.call(request).await?;
                Ok(rewrite_response(response, coordinator, receiver, &config))
            }
            .instrument(span)
            .await
        })
    }
}

/// Wraps an HTML response body in a [`StreamMultiplexer`]; anything else is
/// returned untouched.
pub fn rewrite_response(
    response: Response,
    coordinator: SuspenseCoordinator,
    receiver: OutOfBandReceiver,
    config: &StreamingConfig,
) -> Response {
    let content_type = response.headers().get(CONTENT_TYPE).and_then(|value| value.to_str().ok());

    if !config.is_rewritable(content_type) {
        debug!("Passing through response with content-type {:?}", content_type);
        return response;
    }

    let (parts, body) = response.into_parts();
    let primary = body.into_data_stream().map(|chunk| chunk.map_err(StreamError::from));
    let multiplexer = StreamMultiplexer::new(primary, coordinator, receiver);

    StreamingHtmlResponse::new(parts, multiplexer).into_response()
}
