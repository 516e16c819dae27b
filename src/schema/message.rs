/// Request/response payloads and their protobuf wire form.

use prost::Message;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed request: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Wire form of a generation request.
#[derive(Clone, PartialEq, Message)]
pub struct MarkovRequest {
    #[prost(string, repeated, tag = "1")]
    pub messages: Vec<String>,
    #[prost(string, optional, tag = "2")]
    pub seed: Option<String>,
}

/// Wire form of a generation result.
#[derive(Clone, PartialEq, Message)]
pub struct MarkovResponse {
    #[prost(string, tag = "1")]
    pub result: String,
    #[prost(string, optional, tag = "2")]
    pub error: Option<String>,
}

/// Training corpus plus an optional seed the output must be anchored to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    pub messages: Vec<String>,
    pub seed: Option<String>,
}

impl GenerationRequest {
    /// The seed, with an absent seed read as the empty string.
    pub fn seed(&self) -> &str {
        self.seed.as_deref().unwrap_or("")
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(MarkovRequest::decode(bytes)?.into())
    }

    pub fn encode(&self) -> Vec<u8> {
        MarkovRequest::from(self.clone()).encode_to_vec()
    }
}

/// Exactly one of a sentence or a failure reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    Sentence(String),
    Failure(String),
}

impl GenerationResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(MarkovResponse::decode(bytes)?.into())
    }

    pub fn encode(&self) -> Vec<u8> {
        MarkovResponse::from(self.clone()).encode_to_vec()
    }
}

impl From<MarkovRequest> for GenerationRequest {
    fn from(wire: MarkovRequest) -> Self {
        Self {
            messages: wire.messages,
            seed: wire.seed,
        }
    }
}

impl From<GenerationRequest> for MarkovRequest {
    fn from(request: GenerationRequest) -> Self {
        Self {
            messages: request.messages,
            seed: request.seed,
        }
    }
}

impl From<GenerationResult> for MarkovResponse {
    fn from(result: GenerationResult) -> Self {
        match result {
            GenerationResult::Sentence(result) => Self {
                result,
                error: None,
            },
            GenerationResult::Failure(reason) => Self {
                result: String::new(),
                error: Some(reason),
            },
        }
    }
}

impl From<MarkovResponse> for GenerationResult {
    fn from(wire: MarkovResponse) -> Self {
        match wire.error {
            Some(reason) => Self::Failure(reason),
            None => Self::Sentence(wire.result),
        }
    }
}
