/// Queue transport seam and an in-process implementation.

use async_trait::async_trait;
use std::collections::VecDeque;
use thiserror::Error;

use crate::schema::envelope::{CorrelatedEnvelope, CorrelationId};

/// Transport failures are fatal to the worker.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),
    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// A consumed message that has not been acknowledged yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub delivery_tag: u64,
    pub envelope: CorrelatedEnvelope<Vec<u8>>,
    /// A response published by a worker onto the shared queue, not a request.
    pub is_reply: bool,
}

/// Ingress and egress for the worker loop.
#[async_trait]
pub trait Transport: Send {
    /// Wait for the next message; `Ok(None)` once the consumer is closed.
    async fn receive(&mut self) -> Result<Option<InboundMessage>, TransportError>;

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), TransportError>;

    async fn publish(&mut self, response: CorrelatedEnvelope<Vec<u8>>)
        -> Result<(), TransportError>;
}

/// What a [`MemoryTransport`] saw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Ack(u64),
    Publish(CorrelatedEnvelope<Vec<u8>>),
}

/// In-process queue. Closes once drained.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    inbound: VecDeque<InboundMessage>,
    events: Vec<TransportEvent>,
    next_tag: u64,
    reject_publish: bool,
    loop_back: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a raw payload; returns its delivery tag.
    pub fn push(&mut self, correlation_id: Option<&str>, body: Vec<u8>) -> u64 {
        self.enqueue(correlation_id.map(CorrelationId::from), body, false)
    }

    /// Enqueue a payload marked as a published response.
    pub fn push_reply(&mut self, correlation_id: Option<&str>, body: Vec<u8>) -> u64 {
        self.enqueue(correlation_id.map(CorrelationId::from), body, true)
    }

    /// Feed every publish back into the inbound queue, as a queue shared
    /// by requests and responses does.
    pub fn loop_back_replies(&mut self) {
        self.loop_back = true;
    }

    fn enqueue(
        &mut self,
        correlation_id: Option<CorrelationId>,
        body: Vec<u8>,
        is_reply: bool,
    ) -> u64 {
        self.next_tag += 1;
        self.inbound.push_back(InboundMessage {
            delivery_tag: self.next_tag,
            envelope: CorrelatedEnvelope::new(correlation_id, body),
            is_reply,
        });
        self.next_tag
    }

    /// Make every publish fail, as a lost connection would.
    pub fn reject_publishes(&mut self) {
        self.reject_publish = true;
    }

    pub fn events(&self) -> &[TransportEvent] {
        &self.events
    }

    pub fn acks(&self) -> Vec<u64> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TransportEvent::Ack(tag) => Some(*tag),
                TransportEvent::Publish(_) => None,
            })
            .collect()
    }

    pub fn published(&self) -> Vec<&CorrelatedEnvelope<Vec<u8>>> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TransportEvent::Publish(envelope) => Some(envelope),
                TransportEvent::Ack(_) => None,
            })
            .collect()
    }

    pub fn pending(&self) -> usize {
        self.inbound.len()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn receive(&mut self) -> Result<Option<InboundMessage>, TransportError> {
        Ok(self.inbound.pop_front())
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), TransportError> {
        self.events.push(TransportEvent::Ack(delivery_tag));
        Ok(())
    }

    async fn publish(
        &mut self,
        response: CorrelatedEnvelope<Vec<u8>>,
    ) -> Result<(), TransportError> {
        if self.reject_publish {
            return Err(TransportError::Rejected("channel closed".to_string()));
        }
        if self.loop_back {
            self.enqueue(
                response.correlation_id.clone(),
                response.payload.clone(),
                true,
            );
        }
        self.events.push(TransportEvent::Publish(response));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_in_order_then_closes() {
        let mut transport = MemoryTransport::new();
        let first = transport.push(Some("a"), vec![1]);
        let second = transport.push(None, vec![2]);
        assert_eq!((first, second), (1, 2));

        let message = transport.receive().await.unwrap().unwrap();
        assert_eq!(message.delivery_tag, 1);
        assert!(!message.is_reply);
        assert_eq!(message.envelope.correlation_id, Some(CorrelationId::from("a")));

        let message = transport.receive().await.unwrap().unwrap();
        assert_eq!(message.envelope.payload, vec![2]);
        assert!(transport.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn loop_back_requeues_publishes_as_replies() {
        let mut transport = MemoryTransport::new();
        transport.loop_back_replies();
        transport
            .publish(CorrelatedEnvelope::new(Some(CorrelationId::from("r")), vec![7]))
            .await
            .unwrap();

        let message = transport.receive().await.unwrap().unwrap();
        assert!(message.is_reply);
        assert_eq!(message.envelope.payload, vec![7]);
        assert_eq!(transport.published().len(), 1);
    }

    #[tokio::test]
    async fn rejected_publish_is_an_error() {
        let mut transport = MemoryTransport::new();
        transport.reject_publishes();
        let result = transport
            .publish(CorrelatedEnvelope::new(None, Vec::new()))
            .await;
        assert!(matches!(result, Err(TransportError::Rejected(_))));
        assert!(transport.published().is_empty());
    }
}
