/// Correlation identity carried alongside payloads.

use std::fmt;

/// Opaque, caller-supplied token. Echoed, never generated or altered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A payload tagged with the correlation identity of its request.
///
/// An absent identity stays absent on the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelatedEnvelope<T> {
    pub correlation_id: Option<CorrelationId>,
    pub payload: T,
}

impl<T> CorrelatedEnvelope<T> {
    pub fn new(correlation_id: Option<CorrelationId>, payload: T) -> Self {
        Self {
            correlation_id,
            payload,
        }
    }

    /// Build the reply envelope, carrying this envelope's identity over.
    pub fn reply<U>(&self, payload: U) -> CorrelatedEnvelope<U> {
        CorrelatedEnvelope {
            correlation_id: self.correlation_id.clone(),
            payload,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> CorrelatedEnvelope<U> {
        CorrelatedEnvelope {
            correlation_id: self.correlation_id,
            payload: f(self.payload),
        }
    }
}
