//! Audit writes moved off the async runtime.
//!
//! [`BackgroundSink::record`] only enqueues the event. A single blocking
//! task drains the queue into the wrapped sink in arrival order, so file
//! I/O (and the hash chain's lock) never runs on a tokio worker.

use forgegate_core::{SecurityEvent, SecurityEventSink, SinkError, emit};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct BackgroundSink {
    tx: mpsc::UnboundedSender<SecurityEvent>,
}

impl BackgroundSink {
    /// Start the writer task. It ends once every clone of the returned
    /// sink has been dropped and the queue is drained.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(inner: Arc<dyn SecurityEventSink>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<SecurityEvent>();
        let writer = tokio::task::spawn_blocking(move || {
            while let Some(event) = rx.blocking_recv() {
                emit(inner.as_ref(), &event);
            }
            tracing::debug!("Audit writer drained");
        });
        (Self { tx }, writer)
    }
}

impl SecurityEventSink for BackgroundSink {
    fn record(&self, event: &SecurityEvent) -> Result<(), SinkError> {
        self.tx
            .send(event.clone())
            .map_err(|_| SinkError::Unavailable("audit writer has stopped".into()))
    }
}
