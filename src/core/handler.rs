/// Request handler — one generation request in, one result out.
///
/// Builds a fresh model per request, folds the request seed into the
/// acceptance filter, and turns every failure into a result value.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::chain::ChainBuilder;
use crate::core::sampler::{
    ConstrainedSampler, QualityFilter, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_WORDS,
    DEFAULT_MIN_SCORE, DEFAULT_MIN_WORDS,
};
use crate::schema::message::{GenerationRequest, GenerationResult};

/// Tuning knobs for the generator, read from the `[generator]` config table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    pub max_attempts: u32,
    pub min_words: usize,
    /// Accepted sentences must score strictly above this.
    pub min_score: u64,
    pub max_words: usize,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_words: DEFAULT_MIN_WORDS,
            min_score: DEFAULT_MIN_SCORE,
            max_words: DEFAULT_MAX_WORDS,
        }
    }
}

/// Counters kept across requests, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerStats {
    pub requests: u64,
    pub models_built: u64,
    pub generated: u64,
    pub failed: u64,
}

/// Turns `GenerationRequest`s into `GenerationResult`s.
///
/// Owns the randomness source; inject a seeded rng with
/// [`RequestHandler::with_rng`] for reproducible output.
pub struct RequestHandler<R = StdRng> {
    settings: GeneratorSettings,
    rng: R,
    stats: HandlerStats,
}

impl RequestHandler<StdRng> {
    pub fn new(settings: GeneratorSettings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    pub fn seeded(settings: GeneratorSettings, seed: u64) -> Self {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RequestHandler<R> {
    pub fn with_rng(settings: GeneratorSettings, rng: R) -> Self {
        Self {
            settings,
            rng,
            stats: HandlerStats::default(),
        }
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    pub fn stats(&self) -> HandlerStats {
        self.stats
    }

    /// Handle one request. Never fails: every error becomes a
    /// [`GenerationResult::Failure`].
    pub fn handle(&mut self, request: &GenerationRequest) -> GenerationResult {
        self.stats.requests += 1;

        if request.messages.is_empty() {
            debug!("empty corpus, skipping generation");
            return GenerationResult::Sentence(String::new());
        }

        let model = ChainBuilder::build(&request.messages);
        self.stats.models_built += 1;
        debug!(
            sentences = request.messages.len(),
            states = model.state_count(),
            "model built"
        );

        let filter = QualityFilter {
            min_score: self.settings.min_score,
            min_words: self.settings.min_words,
            seed: request.seed(),
        };
        let sampler = ConstrainedSampler::new(&model).with_max_words(self.settings.max_words);

        match sampler.sample(&mut self.rng, self.settings.max_attempts, |c| {
            filter.accepts(c)
        }) {
            Ok(generated) => {
                self.stats.generated += 1;
                info!(
                    sentence = %generated.sentence,
                    score = generated.score,
                    attempts = generated.attempts,
                    "generated"
                );
                GenerationResult::Sentence(generated.sentence)
            }
            Err(e) => {
                self.stats.failed += 1;
                warn!(error = %e, "generation failed");
                GenerationResult::Failure(e.to_string())
            }
        }
    }
}
