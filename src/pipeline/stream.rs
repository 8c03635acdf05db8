//! Pull-of-a-push adapter over the pipeline's subscription API.
//!
//! A [`RaceEventStream`] registers itself as a pipeline subscriber under a
//! freshly generated id and forwards every race event into an unbounded
//! channel. Dropping the stream deterministically removes the
//! subscription, so a cancelled consumer never leaves a dangling entry
//! behind.

use crate::core::types::RaceEvent;
use crate::pipeline::{PipelineInner, RacePipeline};
use futures::Stream;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Lazily consumed sequence of [`RaceEvent`]s.
///
/// Implements [`futures::Stream`]; `recv` is also available for direct
/// async consumption without stream combinators.
pub struct RaceEventStream {
    id: String,
    rx: mpsc::UnboundedReceiver<RaceEvent>,
    pipeline: Weak<PipelineInner>,
}

impl RaceEventStream {
    pub(crate) fn attach(pipeline: &RacePipeline) -> Self {
        let inner = pipeline.inner();
        let id = format!("race-stream-{}", inner.next_id());
        let (tx, rx) = mpsc::unbounded_channel();
        inner.add_subscriber(
            id.clone(),
            Arc::new(move |event: &RaceEvent| {
                // A closed receiver just means the consumer is gone; Drop
                // will clean the subscription up.
                let _ = tx.send(event.clone());
            }),
        );
        tracing::debug!(stream = %id, "event stream attached");
        Self {
            id,
            rx,
            pipeline: Arc::downgrade(inner),
        }
    }

    /// The subscriber id this stream occupies on the pipeline.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Receives the next race event, or `None` once the pipeline is gone
    /// and the buffered events are drained.
    pub async fn recv(&mut self) -> Option<RaceEvent> {
        self.rx.recv().await
    }
}

impl Stream for RaceEventStream {
    type Item = RaceEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for RaceEventStream {
    fn drop(&mut self) {
        if let Some(inner) = self.pipeline.upgrade() {
            inner.remove_subscriber(&self.id);
            tracing::debug!(stream = %self.id, "event stream detached");
        }
    }
}
