use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error};

use super::coordinator::{SuspenseCoordinator, SuspenseHooks};
use super::types::BoundaryId;
use crate::error::StreamError;

/// Runs boundary producers as background tasks and reports each outcome to
/// the request's coordinator.
pub struct BoundaryResolver {
    coordinator: SuspenseCoordinator,
    timeout: Option<Duration>,
}

impl BoundaryResolver {
    pub fn new(coordinator: SuspenseCoordinator) -> Self {
        Self { coordinator, timeout: None }
    }

    /// Fails any boundary whose producer runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn coordinator(&self) -> &SuspenseCoordinator {
        &self.coordinator
    }

    /// Registers `id` as pending, then renders it in the background.
    pub fn suspend<F>(&self, id: impl Into<BoundaryId>, render: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<String, StreamError>> + Send + 'static,
    {
        let id = id.into();
        self.coordinator.register_pending(id.clone());

        let coordinator = self.coordinator.clone();
        let timeout = self.timeout;
        let span = tracing::debug_span!(
            "suspense_boundary",
            request_id = %coordinator.request_id(),
            boundary_id = %id,
        );

        tokio::spawn(
            async move {
                let outcome = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, render).await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(StreamError::boundary(format!(
                            "boundary did not resolve within {}ms",
                            limit.as_millis()
                        ))),
                    },
                    None => render.await,
                };

                if !coordinator.is_attached() {
                    debug!("Response already gone; discarding boundary outcome");
                }

                match outcome {
                    Ok(content) => coordinator.on_chunk_ready(content, id),
                    Err(err) => {
                        error!("Boundary render failed: {}", err);
                        coordinator.on_boundary_errored_for(&id, err);
                    }
                }
            }
            .instrument(span),
        )
    }

    /// Signals that no more boundaries will be suspended for this request.
    pub fn finish(&self) {
        self.coordinator.on_all_ready();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolves_in_completion_order() {
        let (coordinator, mut receiver) = SuspenseCoordinator::new();
        let resolver = BoundaryResolver::new(coordinator.clone());

        let slow = resolver.suspend(1u64, async {
            tokio::time::sleep(Duration::from_millis(40)).await;
            Ok("<p>slow</p>".to_string())
        });
        let fast = resolver.suspend(2u64, async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok("<p>fast</p>".to_string())
        });
        assert_eq!(coordinator.pending_count(), 2);
        resolver.finish();

        slow.await.unwrap();
        fast.await.unwrap();

        assert_eq!(receiver.recv().await.unwrap().unwrap().id, BoundaryId::from(2u64));
        assert_eq!(receiver.recv().await.unwrap().unwrap().id, BoundaryId::from(1u64));
        assert!(receiver.recv().await.unwrap().is_none());
        assert_eq!(resolver.coordinator().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_timeout_fails_boundary() {
        let (coordinator, mut receiver) = SuspenseCoordinator::new();
        let resolver =
            BoundaryResolver::new(coordinator.clone()).with_timeout(Duration::from_millis(5));

        let handle = resolver.suspend("stuck", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(String::new())
        });
        handle.await.unwrap();

        let error = receiver.recv().await.unwrap_err();
        assert!(error.is_boundary_failure());
        assert_eq!(error.get_property("boundary_id"), Some("stuck"));
        assert!(!coordinator.has_pending());
    }

    #[tokio::test]
    async fn test_render_error_fails_channel() {
        let (coordinator, mut receiver) = SuspenseCoordinator::new();
        let resolver = BoundaryResolver::new(coordinator);

        resolver.suspend(9u64, async { Err(StreamError::boundary("db down")) }).await.unwrap();

        let error = receiver.recv().await.unwrap_err();
        assert_eq!(error.message(), "db down");
    }
}
