/// Constrained sampler — random walks over a transition model with a
/// bounded retry budget and an acceptance filter.

use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::core::chain::{SentenceId, Successor, TransitionModel};

/// Attempts made before a request is declared exhausted.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10_000;
/// Minimum word count of an accepted sentence.
pub const DEFAULT_MIN_WORDS: usize = 10;
/// Accepted candidates must score strictly above this.
pub const DEFAULT_MIN_SCORE: u64 = 5;
/// Hard cap on the length of a single walk.
pub const DEFAULT_MAX_WORDS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    #[error("no sentence start in model")]
    EmptyModel,
    #[error("Failed to build a sentence after {attempts} tries")]
    Exhausted { attempts: u32 },
}

/// One walk through the model, before filtering.
#[derive(Debug, Clone)]
pub struct Candidate<'m> {
    pub tokens: Vec<&'m str>,
    /// Sum over every step of the outgoing weight of its state, minus one.
    pub score: u64,
    /// Union of the back-references of every chosen token.
    pub refs: Vec<SentenceId>,
    /// The walk reached a terminal state instead of the length cap.
    pub ended: bool,
    model: &'m TransitionModel,
}

impl<'m> Candidate<'m> {
    pub fn text(&self) -> String {
        self.tokens.join(" ")
    }

    pub fn word_count(&self) -> usize {
        self.tokens.len()
    }

    /// Source sentences this candidate was stitched from.
    pub fn sources(&self) -> impl Iterator<Item = &'m str> + '_ {
        self.refs.iter().filter_map(|id| self.model.sentence(*id))
    }
}

/// An accepted candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub sentence: String,
    pub score: u64,
    pub refs: Vec<SentenceId>,
    /// 1-based attempt on which the candidate was accepted.
    pub attempts: u32,
}

/// The acceptance predicate used by request handling.
#[derive(Debug, Clone, Copy)]
pub struct QualityFilter<'a> {
    pub min_score: u64,
    pub min_words: usize,
    /// Must appear verbatim in at least one source sentence.
    pub seed: &'a str,
}

impl<'a> QualityFilter<'a> {
    pub fn new(seed: &'a str) -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
            min_words: DEFAULT_MIN_WORDS,
            seed,
        }
    }

    pub fn accepts(&self, candidate: &Candidate<'_>) -> bool {
        candidate.score > self.min_score
            && candidate.word_count() >= self.min_words
            && candidate.sources().any(|source| source.contains(self.seed))
    }
}

/// Walks a borrowed model; the model is never shared beyond one request.
pub struct ConstrainedSampler<'m> {
    model: &'m TransitionModel,
    max_words: usize,
}

impl<'m> ConstrainedSampler<'m> {
    pub fn new(model: &'m TransitionModel) -> Self {
        Self {
            model,
            max_words: DEFAULT_MAX_WORDS,
        }
    }

    pub fn with_max_words(mut self, max_words: usize) -> Self {
        self.max_words = max_words.max(1);
        self
    }

    /// Draw candidates until `accept` takes one or `max_attempts` runs out.
    ///
    /// Never returns a rejected candidate, nor a walk cut off by the length
    /// cap. With a seeded rng the outcome is fully reproducible.
    pub fn sample<R, F>(
        &self,
        rng: &mut R,
        max_attempts: u32,
        mut accept: F,
    ) -> Result<Generated, SampleError>
    where
        R: Rng + ?Sized,
        F: FnMut(&Candidate<'m>) -> bool,
    {
        if self.model.is_empty() {
            return Err(SampleError::EmptyModel);
        }

        for attempt in 1..=max_attempts {
            let Some(candidate) = self.walk(rng) else {
                continue;
            };
            if candidate.ended && accept(&candidate) {
                return Ok(Generated {
                    sentence: candidate.text(),
                    score: candidate.score,
                    refs: candidate.refs,
                    attempts: attempt,
                });
            }
        }

        Err(SampleError::Exhausted {
            attempts: max_attempts,
        })
    }

    /// Single walk from a weighted start until a terminal state or the
    /// length cap.
    pub fn walk<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Candidate<'m>> {
        let start = pick(self.model.starts(), rng)?;

        let mut tokens = vec![start.token.as_str()];
        let mut refs: BTreeSet<SentenceId> = start.refs.iter().copied().collect();
        let mut score = 0u64;

        while tokens.len() < self.max_words {
            let state = tokens[tokens.len() - 1];
            let Some(options) = self.model.successors(state) else {
                break;
            };
            let next = pick(options, rng)?;

            score += u64::from(self.model.weight(state)).saturating_sub(1);
            tokens.push(next.token.as_str());
            refs.extend(next.refs.iter().copied());
        }

        let ended = self.model.successors(tokens[tokens.len() - 1]).is_none();
        Some(Candidate {
            tokens,
            score,
            refs: refs.into_iter().collect(),
            ended,
            model: self.model,
        })
    }
}

/// Pick a successor in proportion to its observation count.
fn pick<'a, R: Rng + ?Sized>(options: &'a [Successor], rng: &mut R) -> Option<&'a Successor> {
    let dist = WeightedIndex::new(options.iter().map(|s| s.count)).ok()?;
    Some(&options[dist.sample(rng)])
}
