// ABOUTME: Receiving end of a real-time subscription
// ABOUTME: Wraps a bounded channel and converts into a Stream for consumers that prefer one
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::models::RealtimeSample;

/// Subscription handle
///
/// Dropping it closes the channel; the hub prunes closed observers on the next
/// publish. Call `unsubscribe_realtime` to stop polling immediately.
#[derive(Debug)]
pub struct RealtimeSubscription {
    id: Uuid,
    receiver: mpsc::Receiver<RealtimeSample>,
}

impl RealtimeSubscription {
    pub(crate) const fn new(id: Uuid, receiver: mpsc::Receiver<RealtimeSample>) -> Self {
        Self { id, receiver }
    }

    /// Identifier used to unsubscribe
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Next sample, `None` once unsubscribed
    pub async fn recv(&mut self) -> Option<RealtimeSample> {
        self.receiver.recv().await
    }

    /// Next sample if one is queued
    pub fn try_recv(&mut self) -> Option<RealtimeSample> {
        match self.receiver.try_recv() {
            Ok(sample) => Some(sample),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Consume into a stream of samples
    #[must_use]
    pub fn into_stream(self) -> ReceiverStream<RealtimeSample> {
        ReceiverStream::new(self.receiver)
    }
}
