use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};
use uuid::Uuid;

use super::channel::{OutOfBandReceiver, OutOfBandSender, out_of_band_channel};
use super::registry::BoundaryRegistry;
use super::types::{BoundaryId, ReadyChunk};
use crate::error::StreamError;

/// Notifications a renderer sends while its boundaries settle.
pub trait SuspenseHooks: Send + Sync {
    /// A boundary finished; `content` is its rendered markup.
    fn on_chunk_ready(&self, content: String, boundary_id: BoundaryId);

    /// A boundary failed. Fails the whole remaining response.
    fn on_boundary_errored(&self, error: StreamError);

    /// No further boundaries will be registered for this request.
    fn on_all_ready(&self);
}

#[derive(Debug, Default)]
struct CoordinatorState {
    registry: BoundaryRegistry,
    all_ready: bool,
    terminal_error: Option<StreamError>,
}

struct CoordinatorInner {
    request_id: String,
    state: Mutex<CoordinatorState>,
    sender: OutOfBandSender,
    handles: AtomicUsize,
}

impl CoordinatorInner {
    /// Last producer handle is gone: nothing can resolve the remaining
    /// boundaries, so settle the channel instead of leaving the consumer waiting.
    fn abandon(&self) {
        let mut state = self.state.lock();
        if state.terminal_error.is_some() || !self.sender.is_open() {
            return;
        }

        if state.registry.is_empty() {
            self.sender.close();
            return;
        }

        let error = StreamError::state(format!(
            "coordinator dropped with {} boundaries pending",
            state.registry.size()
        ));
        warn!(request_id = %self.request_id, "{}", error);
        state.terminal_error = Some(error.clone());
        self.sender.fail(error);
    }
}

/// Per-request hub between boundary producers and the response multiplexer.
///
/// Cheap to clone; every clone refers to the same request state. Registry and
/// channel updates happen under one lock, so racing producers cannot reorder
/// a push behind the close triggered by another boundary.
///
/// Dropping the last handle settles the channel: closed if nothing is
/// pending, failed otherwise.
pub struct SuspenseCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl SuspenseCoordinator {
    pub fn new() -> (Self, OutOfBandReceiver) {
        Self::with_request_id(Uuid::new_v4().to_string())
    }

    pub fn with_request_id(request_id: impl Into<String>) -> (Self, OutOfBandReceiver) {
        let (sender, receiver) = out_of_band_channel();
        let coordinator = Self {
            inner: Arc::new(CoordinatorInner {
                request_id: request_id.into(),
                state: Mutex::new(CoordinatorState::default()),
                sender,
                handles: AtomicUsize::new(1),
            }),
        };

        (coordinator, receiver)
    }

    pub fn request_id(&self) -> &str {
        &self.inner.request_id
    }

    /// Read-only view that does not keep producers alive.
    pub fn observer(&self) -> CoordinatorObserver {
        CoordinatorObserver { inner: Arc::clone(&self.inner) }
    }

    /// Marks a boundary as suspended. Returns `false` if it already was.
    pub fn register_pending(&self, id: impl Into<BoundaryId>) -> bool {
        let id = id.into();
        let mut state = self.inner.state.lock();

        if state.all_ready {
            warn!(
                request_id = %self.inner.request_id,
                "Boundary {} registered after all_ready; its content may never be delivered",
                id
            );
        }

        let added = state.registry.add(id.clone());
        if !added {
            debug!(request_id = %self.inner.request_id, "Boundary {} already pending", id);
        }
        added
    }

    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().registry.size()
    }

    pub fn has_pending(&self) -> bool {
        !self.inner.state.lock().registry.is_empty()
    }

    pub fn is_pending(&self, id: &BoundaryId) -> bool {
        self.inner.state.lock().registry.contains(id)
    }

    pub fn is_all_ready(&self) -> bool {
        self.inner.state.lock().all_ready
    }

    pub fn terminal_error(&self) -> Option<StreamError> {
        self.inner.state.lock().terminal_error.clone()
    }

    /// Whether anyone is still consuming this request's out-of-band chunks.
    pub fn is_attached(&self) -> bool {
        self.inner.sender.is_receiver_alive()
    }

    /// Like [`SuspenseHooks::on_boundary_errored`], also releasing `id` from
    /// the pending set and tagging the error with it.
    pub fn on_boundary_errored_for(&self, id: &BoundaryId, error: StreamError) {
        let error = error.with_property("boundary_id", &id.to_string());
        let mut state = self.inner.state.lock();
        state.registry.remove(id);
        self.fail_locked(&mut state, error);
    }

    fn fail_locked(&self, state: &mut CoordinatorState, error: StreamError) {
        if state.terminal_error.is_some() {
            debug!(
                request_id = %self.inner.request_id,
                "Ignoring boundary error after terminal failure: {}",
                error
            );
            return;
        }

        warn!(request_id = %self.inner.request_id, "Boundary errored, failing response: {}", error);
        state.terminal_error = Some(error.clone());
        self.inner.sender.fail(error);
    }
}

impl SuspenseHooks for SuspenseCoordinator {
    fn on_chunk_ready(&self, content: String, boundary_id: BoundaryId) {
        let mut state = self.inner.state.lock();

        if !state.registry.remove(&boundary_id) {
            debug!(
                request_id = %self.inner.request_id,
                "Boundary {} was not pending; forwarding chunk anyway",
                boundary_id
            );
        }

        self.inner.sender.push(ReadyChunk { id: boundary_id, content });

        if state.all_ready && state.registry.is_empty() {
            self.inner.sender.close();
        }
    }

    fn on_boundary_errored(&self, error: StreamError) {
        let mut state = self.inner.state.lock();
        self.fail_locked(&mut state, error);
    }

    fn on_all_ready(&self) {
        let mut state = self.inner.state.lock();

        if state.all_ready {
            return;
        }
        state.all_ready = true;

        if state.registry.is_empty() {
            self.inner.sender.close();
        } else {
            debug!(
                request_id = %self.inner.request_id,
                "all_ready with {} boundaries pending; closing once they resolve",
                state.registry.size()
            );
        }
    }
}

impl Clone for SuspenseCoordinator {
    fn clone(&self) -> Self {
        self.inner.handles.fetch_add(1, Ordering::Relaxed);
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl Drop for SuspenseCoordinator {
    fn drop(&mut self) {
        if self.inner.handles.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.abandon();
        }
    }
}

/// Lets the response side inspect a request's boundaries without counting as
/// a producer.
#[derive(Clone)]
pub struct CoordinatorObserver {
    inner: Arc<CoordinatorInner>,
}

impl CoordinatorObserver {
    pub fn request_id(&self) -> &str {
        &self.inner.request_id
    }

    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().registry.size()
    }

    pub fn terminal_error(&self) -> Option<StreamError> {
        self.inner.state.lock().terminal_error.clone()
    }
}

impl std::fmt::Debug for SuspenseCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("SuspenseCoordinator")
            .field("request_id", &self.inner.request_id)
            .field("pending", &state.registry.size())
            .field("all_ready", &state.all_ready)
            .field("failed", &state.terminal_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pending_count_tracks_resolution() {
        let (coordinator, _receiver) = SuspenseCoordinator::new();

        coordinator.register_pending(1u64);
        coordinator.register_pending(2u64);
        coordinator.register_pending(3u64);
        assert_eq!(coordinator.pending_count(), 3);

        coordinator.on_chunk_ready("<p>two</p>".to_string(), 2u64.into());
        assert_eq!(coordinator.pending_count(), 2);
        assert!(!coordinator.is_pending(&2u64.into()));

        coordinator.on_chunk_ready("<p>two again</p>".to_string(), 2u64.into());
        assert_eq!(coordinator.pending_count(), 2);

        coordinator.on_boundary_errored_for(&1u64.into(), StreamError::boundary("nope"));
        assert_eq!(coordinator.pending_count(), 1);
        assert!(coordinator.has_pending());
    }

    #[tokio::test]
    async fn test_duplicate_registration_counts_once() {
        let (coordinator, _receiver) = SuspenseCoordinator::new();
        assert!(coordinator.register_pending("card"));
        assert!(!coordinator.register_pending("card"));
        assert_eq!(coordinator.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_ready_pushes_twice() {
        let (coordinator, mut receiver) = SuspenseCoordinator::new();
        coordinator.register_pending(1u64);

        coordinator.on_chunk_ready("a".to_string(), 1u64.into());
        coordinator.on_chunk_ready("a".to_string(), 1u64.into());
        coordinator.on_all_ready();

        assert_eq!(receiver.recv().await.unwrap().unwrap().content, "a");
        assert_eq!(receiver.recv().await.unwrap().unwrap().content, "a");
        assert!(receiver.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_all_ready_defers_close_until_pending_resolve() {
        let (coordinator, mut receiver) = SuspenseCoordinator::new();
        coordinator.register_pending(1u64);
        coordinator.on_all_ready();
        assert!(coordinator.is_all_ready());

        coordinator.on_chunk_ready("late".to_string(), 1u64.into());

        let chunk = receiver.recv().await.unwrap().unwrap();
        assert_eq!(chunk.content, "late");
        assert!(receiver.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_error_is_terminal() {
        let (coordinator, mut receiver) = SuspenseCoordinator::new();
        coordinator.register_pending(1u64);
        coordinator.register_pending(2u64);

        coordinator.on_boundary_errored(StreamError::boundary("first"));
        coordinator.on_boundary_errored(StreamError::boundary("second"));
        coordinator.on_chunk_ready("ignored".to_string(), 2u64.into());

        assert_eq!(coordinator.terminal_error().map(|e| e.message().to_string()), Some("first".to_string()));

        let error = receiver.recv().await.unwrap_err();
        assert_eq!(error.message(), "first");
    }

    #[tokio::test]
    async fn test_errored_for_tags_boundary_id() {
        let (coordinator, mut receiver) = SuspenseCoordinator::new();
        coordinator.register_pending("reviews");
        coordinator.on_boundary_errored_for(&"reviews".into(), StreamError::boundary("timeout"));

        let error = receiver.recv().await.unwrap_err();
        assert_eq!(error.get_property("boundary_id"), Some("reviews"));
    }

    #[tokio::test]
    async fn test_torn_down_coordinator_is_safe() {
        let (coordinator, receiver) = SuspenseCoordinator::new();
        coordinator.register_pending(1u64);
        drop(receiver);

        assert!(!coordinator.is_attached());
        coordinator.on_chunk_ready("<p>late</p>".to_string(), 1u64.into());
        coordinator.on_boundary_errored(StreamError::boundary("late"));
        coordinator.on_all_ready();
        assert_eq!(coordinator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_dropping_last_handle_with_pending_fails_channel() {
        let (coordinator, mut receiver) = SuspenseCoordinator::new();
        coordinator.register_pending(1u64);
        coordinator.register_pending(2u64);
        coordinator.on_chunk_ready("<p>one</p>".to_string(), 1u64.into());

        let observer = coordinator.observer();
        let producer = coordinator.clone();
        drop(coordinator);
        assert_eq!(observer.pending_count(), 1);
        drop(producer);

        let error = receiver.recv().await.unwrap_err();
        assert!(matches!(error, StreamError::State(_, _)));
        assert_eq!(observer.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_dropping_last_handle_without_pending_closes_channel() {
        let (coordinator, mut receiver) = SuspenseCoordinator::new();
        coordinator.register_pending(1u64);
        coordinator.on_chunk_ready("<p>one</p>".to_string(), 1u64.into());
        drop(coordinator);

        assert_eq!(receiver.recv().await.unwrap().unwrap().content, "<p>one</p>");
        assert!(receiver.recv().await.unwrap().is_none());
    }
}
