use futures::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::types::ReadyChunk;
use crate::error::StreamError;

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelStatus {
    Open,
    Closed,
    Failed(StreamError),
}

enum Signal {
    Chunk(ReadyChunk),
    Settled,
}

/// Creates the queue that carries ready chunks from producers to the single
/// consumer draining them after the primary document.
pub fn out_of_band_channel() -> (OutOfBandSender, OutOfBandReceiver) {
    let (tx, rx) = mpsc::unbounded_channel::<Signal>();
    let status = Arc::new(Mutex::new(ChannelStatus::Open));

    (
        OutOfBandSender { tx, status: Arc::clone(&status) },
        OutOfBandReceiver { rx, status, settled: false, terminated: false },
    )
}

/// Producer half. Never blocks; every operation after the channel settled or
/// after the receiver went away is a no-op that reports `false`.
#[derive(Clone)]
pub struct OutOfBandSender {
    tx: mpsc::UnboundedSender<Signal>,
    status: Arc<Mutex<ChannelStatus>>,
}

impl OutOfBandSender {
    pub fn push(&self, chunk: ReadyChunk) -> bool {
        let status = self.status.lock();

        if *status != ChannelStatus::Open {
            debug!("Ignoring ready chunk for boundary {}: channel already settled", chunk.id);
            return false;
        }

        let id = chunk.id.clone();
        if self.tx.send(Signal::Chunk(chunk)).is_err() {
            warn!("Dropping ready chunk for boundary {}: receiver is gone", id);
            return false;
        }

        debug!("enqueuing boundary {}", id);
        true
    }

    pub fn close(&self) -> bool {
        self.settle(ChannelStatus::Closed)
    }

    /// Failure wins over anything still queued.
    pub fn fail(&self, error: StreamError) -> bool {
        self.settle(ChannelStatus::Failed(error))
    }

    pub fn is_open(&self) -> bool {
        *self.status.lock() == ChannelStatus::Open
    }

    pub fn is_receiver_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    pub fn status(&self) -> ChannelStatus {
        self.status.lock().clone()
    }

    fn settle(&self, next: ChannelStatus) -> bool {
        let mut status = self.status.lock();
        if *status != ChannelStatus::Open {
            return false;
        }
        *status = next;
        let _ = self.tx.send(Signal::Settled);
        true
    }
}

/// Consumer half. Yields chunks in push order; once failed, every poll
/// reports the failure. Losing every sender while still open counts as a
/// failure.
pub struct OutOfBandReceiver {
    rx: mpsc::UnboundedReceiver<Signal>,
    status: Arc<Mutex<ChannelStatus>>,
    settled: bool,
    terminated: bool,
}

impl OutOfBandReceiver {
    pub fn poll_recv(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ReadyChunk>, StreamError>> {
        if let ChannelStatus::Failed(error) = &*self.status.lock() {
            return Poll::Ready(Err(error.clone()));
        }

        if self.settled {
            return Poll::Ready(Ok(None));
        }

        let signal = match self.rx.poll_recv(cx) {
            Poll::Ready(signal) => signal,
            Poll::Pending => return Poll::Pending,
        };

        let mut status = self.status.lock();
        if let ChannelStatus::Failed(error) = &*status {
            return Poll::Ready(Err(error.clone()));
        }

        match signal {
            Some(Signal::Chunk(chunk)) => Poll::Ready(Ok(Some(chunk))),
            Some(Signal::Settled) => {
                self.settled = true;
                Poll::Ready(Ok(None))
            }
            None if *status == ChannelStatus::Closed => {
                self.settled = true;
                Poll::Ready(Ok(None))
            }
            None => {
                warn!("Out-of-band channel abandoned while still open");
                let error = StreamError::state(
                    "all producers dropped before the out-of-band channel was closed",
                );
                *status = ChannelStatus::Failed(error.clone());
                Poll::Ready(Err(error))
            }
        }
    }

    pub async fn recv(&mut self) -> Result<Option<ReadyChunk>, StreamError> {
        futures::future::poll_fn(|cx| self.poll_recv(cx)).await
    }
}

impl Stream for OutOfBandReceiver {
    type Item = Result<ReadyChunk, StreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.terminated {
            return Poll::Ready(None);
        }

        match self.poll_recv(cx) {
            Poll::Ready(Ok(Some(chunk))) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(Ok(None)) => {
                self.terminated = true;
                Poll::Ready(None)
            }
            Poll::Ready(Err(error)) => {
                self.terminated = true;
                Poll::Ready(Some(Err(error)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
