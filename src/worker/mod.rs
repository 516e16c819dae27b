/// Queue worker loop — one message at a time, acked before generation,
/// exactly one correlated response per consumed message.

pub mod amqp;
pub mod transport;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::core::handler::RequestHandler;
use crate::schema::message::{GenerationRequest, GenerationResult};
use transport::{InboundMessage, Transport, TransportError};

/// Stages a consumed message moves through.
///
/// Normal path: `Received → Decoded → Acknowledged → Delegated → Responded`.
/// A payload that fails to decode skips `Decoded` and `Delegated`. A
/// response read back off the shared queue stops at `Acknowledged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Decoded,
    Acknowledged,
    Delegated,
    Responded,
}

impl Stage {
    fn can_advance_to(self, next: Stage) -> bool {
        matches!(
            (self, next),
            (Stage::Received, Stage::Decoded)
                | (Stage::Received, Stage::Acknowledged)
                | (Stage::Decoded, Stage::Acknowledged)
                | (Stage::Acknowledged, Stage::Delegated)
                | (Stage::Acknowledged, Stage::Responded)
                | (Stage::Delegated, Stage::Responded)
        )
    }
}

/// Stages visited by one message, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTrace {
    stages: Vec<Stage>,
}

impl MessageTrace {
    fn new() -> Self {
        Self {
            stages: vec![Stage::Received],
        }
    }

    fn advance(&mut self, next: Stage) {
        let current = self.current();
        debug_assert!(
            current.can_advance_to(next),
            "illegal stage transition {current:?} -> {next:?}"
        );
        debug!(from = ?current, to = ?next, "stage");
        self.stages.push(next);
    }

    pub fn current(&self) -> Stage {
        self.stages[self.stages.len() - 1]
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

/// Consumes requests from a transport and answers each one.
pub struct Worker<T, R = StdRng> {
    transport: T,
    handler: RequestHandler<R>,
    processed: u64,
    skipped: u64,
}

impl<T: Transport, R: Rng> Worker<T, R> {
    pub fn new(transport: T, handler: RequestHandler<R>) -> Self {
        Self {
            transport,
            handler,
            processed: 0,
            skipped: 0,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn handler(&self) -> &RequestHandler<R> {
        &self.handler
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Responses consumed off the shared queue and dropped.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Process messages until the consumer closes.
    ///
    /// Returns `Ok(())` when the transport runs dry; any transport error
    /// ends the loop.
    pub async fn run(&mut self) -> Result<(), TransportError> {
        while let Some(message) = self.transport.receive().await? {
            let span = info_span!(
                "request",
                correlation_id = message
                    .envelope
                    .correlation_id
                    .as_ref()
                    .map(|id| id.as_str())
                    .unwrap_or("-"),
                delivery_tag = message.delivery_tag
            );
            self.process(message).instrument(span).await?;
        }

        info!(processed = self.processed, "consumer closed");
        Ok(())
    }

    /// Drive one message through every stage.
    pub async fn process(
        &mut self,
        message: InboundMessage,
    ) -> Result<MessageTrace, TransportError> {
        let mut trace = MessageTrace::new();
        let InboundMessage {
            delivery_tag,
            envelope,
            is_reply,
        } = message;

        // Responses share the queue with requests and decode as requests;
        // answering them would feed the worker its own output.
        if is_reply {
            self.transport.ack(delivery_tag).await?;
            trace.advance(Stage::Acknowledged);
            debug!(bytes = envelope.payload.len(), "skipping response");
            self.skipped += 1;
            return Ok(trace);
        }

        let decoded = GenerationRequest::decode(&envelope.payload);
        if decoded.is_ok() {
            trace.advance(Stage::Decoded);
        }

        // Acked before generation: a failed generation is reported through
        // the response, never through redelivery.
        self.transport.ack(delivery_tag).await?;
        trace.advance(Stage::Acknowledged);

        let result = match decoded {
            Ok(request) => {
                let result = self.handler.handle(&request);
                trace.advance(Stage::Delegated);
                result
            }
            Err(e) => {
                warn!(error = %e, bytes = envelope.payload.len(), "malformed request");
                GenerationResult::Failure(e.to_string())
            }
        };

        self.transport.publish(envelope.reply(result.encode())).await?;
        trace.advance(Stage::Responded);
        self.processed += 1;

        Ok(trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::handler::GeneratorSettings;
    use crate::schema::envelope::CorrelationId;
    use transport::{MemoryTransport, TransportEvent};

    fn worker(transport: MemoryTransport) -> Worker<MemoryTransport> {
        Worker::new(
            transport,
            RequestHandler::seeded(GeneratorSettings::default(), 5),
        )
    }

    #[test]
    fn stage_transitions() {
        assert!(Stage::Received.can_advance_to(Stage::Decoded));
        assert!(Stage::Decoded.can_advance_to(Stage::Acknowledged));
        assert!(Stage::Acknowledged.can_advance_to(Stage::Delegated));
        assert!(!Stage::Received.can_advance_to(Stage::Delegated));
        assert!(!Stage::Decoded.can_advance_to(Stage::Delegated));
        assert!(!Stage::Responded.can_advance_to(Stage::Received));
    }

    #[tokio::test]
    async fn decoded_message_visits_every_stage() {
        let mut transport = MemoryTransport::new();
        transport.push(Some("c-1"), GenerationRequest::default().encode());
        let mut worker = worker(MemoryTransport::new());

        let message = transport.receive().await.unwrap().unwrap();
        let trace = worker.process(message).await.unwrap();
        assert_eq!(
            trace.stages(),
            &[
                Stage::Received,
                Stage::Decoded,
                Stage::Acknowledged,
                Stage::Delegated,
                Stage::Responded,
            ]
        );
    }

    #[tokio::test]
    async fn malformed_message_is_acked_and_answered() {
        let mut transport = MemoryTransport::new();
        transport.push(Some("bad"), vec![0xff, 0xff, 0xff]);
        let mut worker = worker(MemoryTransport::new());

        let message = transport.receive().await.unwrap().unwrap();
        let trace = worker.process(message).await.unwrap();
        assert_eq!(
            trace.stages(),
            &[Stage::Received, Stage::Acknowledged, Stage::Responded]
        );

        let events = worker.transport().events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], TransportEvent::Ack(1));
        let TransportEvent::Publish(response) = &events[1] else {
            panic!("expected a publish, got {:?}", events[1]);
        };
        assert_eq!(response.correlation_id, Some(CorrelationId::from("bad")));
        let result = GenerationResult::decode(&response.payload).unwrap();
        assert!(result.is_failure());
        assert_eq!(worker.handler().stats().requests, 0);
    }

    #[tokio::test]
    async fn reply_is_acked_and_dropped() {
        let mut transport = MemoryTransport::new();
        transport.push_reply(Some("r"), GenerationResult::Sentence(String::new()).encode());
        let mut worker = worker(MemoryTransport::new());

        let message = transport.receive().await.unwrap().unwrap();
        let trace = worker.process(message).await.unwrap();
        assert_eq!(trace.stages(), &[Stage::Received, Stage::Acknowledged]);
        assert_eq!(worker.transport().events(), &[TransportEvent::Ack(1)]);
        assert_eq!(worker.handler().stats().requests, 0);
        assert_eq!(worker.skipped(), 1);
    }
}
