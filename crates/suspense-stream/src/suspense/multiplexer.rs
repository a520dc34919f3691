use bytes::Bytes;
use futures::Stream;
use futures::stream::FusedStream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, warn};

use super::bootstrap::{BOOTSTRAP_SCRIPT_END, BOOTSTRAP_SCRIPT_START, chunk_instruction};
use super::channel::OutOfBandReceiver;
use super::coordinator::{CoordinatorObserver, SuspenseCoordinator};
use crate::error::StreamError;

pub type PrimaryStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiplexerState {
    ForwardingPrimary,
    EmittingPreamble,
    DrainingChannel,
    EmittingPostamble,
    Done,
    Errored,
}

/// One-shot response body: the primary document first, then, if boundaries
/// were pending when it ended, a bootstrap script carrying one insertion per
/// ready chunk in arrival order.
///
/// Dropping it mid-stream releases both inputs; later producer calls become
/// no-ops.
pub struct StreamMultiplexer {
    state: MultiplexerState,
    primary: Option<PrimaryStream>,
    receiver: Option<OutOfBandReceiver>,
    coordinator: CoordinatorObserver,
    instructions_emitted: usize,
}

impl StreamMultiplexer {
    pub fn new<S>(primary: S, coordinator: SuspenseCoordinator, receiver: OutOfBandReceiver) -> Self
    where
        S: Stream<Item = Result<Bytes, StreamError>> + Send + 'static,
    {
        Self {
            state: MultiplexerState::ForwardingPrimary,
            primary: Some(Box::pin(primary)),
            receiver: Some(receiver),
            coordinator: coordinator.observer(),
            instructions_emitted: 0,
        }
    }

    pub fn state(&self) -> MultiplexerState {
        self.state
    }

    pub fn instructions_emitted(&self) -> usize {
        self.instructions_emitted
    }

    fn release(&mut self) {
        self.primary = None;
        self.receiver = None;
    }

    fn fail(&mut self, error: StreamError) -> Poll<Option<Result<Bytes, StreamError>>> {
        warn!(
            request_id = %self.coordinator.request_id(),
            "Terminating response stream: {}",
            error
        );
        self.release();
        self.state = MultiplexerState::Errored;
        Poll::Ready(Some(Err(error)))
    }
}

impl Stream for StreamMultiplexer {
    type Item = Result<Bytes, StreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            match this.state {
                MultiplexerState::ForwardingPrimary => {
                    let Some(primary) = this.primary.as_mut() else {
                        return this.fail(StreamError::state("primary stream already released"));
                    };

                    match primary.as_mut().poll_next(cx) {
                        Poll::Ready(Some(Ok(chunk))) => return Poll::Ready(Some(Ok(chunk))),
                        Poll::Ready(Some(Err(error))) => return this.fail(error),
                        Poll::Ready(None) => {
                            this.primary = None;

                            // A failed boundary no longer counts as pending.
                            if let Some(error) = this.coordinator.terminal_error() {
                                return this.fail(error);
                            }

                            // Snapshot: boundaries settling after this point are not observed.
                            let pending = this.coordinator.pending_count();
                            if pending == 0 {
                                this.release();
                                this.state = MultiplexerState::Done;
                                return Poll::Ready(None);
                            }

                            debug!(
                                request_id = %this.coordinator.request_id(),
                                "{} chunks pending",
                                pending
                            );
                            this.state = MultiplexerState::EmittingPreamble;
                        }
                        Poll::Pending => return Poll::Pending,
                    }
                }
                MultiplexerState::EmittingPreamble => {
                    this.state = MultiplexerState::DrainingChannel;
                    return Poll::Ready(Some(Ok(Bytes::from_static(
                        BOOTSTRAP_SCRIPT_START.as_bytes(),
                    ))));
                }
                MultiplexerState::DrainingChannel => {
                    let Some(receiver) = this.receiver.as_mut() else {
                        return this.fail(StreamError::state("out-of-band channel already released"));
                    };

                    match receiver.poll_recv(cx) {
                        Poll::Ready(Ok(Some(chunk))) => {
                            debug!(
                                request_id = %this.coordinator.request_id(),
                                "yielding boundary {}",
                                chunk.id
                            );
                            this.instructions_emitted += 1;
                            return Poll::Ready(Some(Ok(Bytes::from(chunk_instruction(&chunk)))));
                        }
                        Poll::Ready(Ok(None)) => {
                            this.receiver = None;
                            this.state = MultiplexerState::EmittingPostamble;
                        }
                        Poll::Ready(Err(error)) => return this.fail(error),
                        Poll::Pending => return Poll::Pending,
                    }
                }
                MultiplexerState::EmittingPostamble => {
                    this.state = MultiplexerState::Done;
                    return Poll::Ready(Some(Ok(Bytes::from_static(BOOTSTRAP_SCRIPT_END.as_bytes()))));
                }
                MultiplexerState::Done | MultiplexerState::Errored => return Poll::Ready(None),
            }
        }
    }
}

impl FusedStream for StreamMultiplexer {
    fn is_terminated(&self) -> bool {
        matches!(self.state, MultiplexerState::Done | MultiplexerState::Errored)
    }
}

impl Drop for StreamMultiplexer {
    fn drop(&mut self) {
        if !self.is_terminated() {
            debug!(
                request_id = %self.coordinator.request_id(),
                "Response dropped in state {:?}; releasing streams",
                self.state
            );
        }
    }
}
