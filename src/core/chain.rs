/// Chain builder — turns a training corpus into a first-order transition model.

use rustc_hash::FxHashMap;

/// Index of a training sentence inside the model's corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SentenceId(pub usize);

/// One observed successor of a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Successor {
    pub token: String,
    /// Number of times this successor was observed after the state.
    pub count: u32,
    /// Training sentences the observation came from, ascending, no duplicates.
    pub refs: Vec<SentenceId>,
}

impl Successor {
    fn new(token: &str, source: SentenceId) -> Self {
        Self {
            token: token.to_string(),
            count: 1,
            refs: vec![source],
        }
    }

    fn observe(&mut self, source: SentenceId) {
        self.count += 1;
        if self.refs.last() != Some(&source) {
            self.refs.push(source);
        }
    }
}

/// State → successors table built from one request's corpus.
///
/// The state window is a single token. Successor lists keep insertion
/// order, so sampling with a seeded rng is reproducible.
#[derive(Debug, Clone, Default)]
pub struct TransitionModel {
    sentences: Vec<String>,
    starts: Vec<Successor>,
    transitions: FxHashMap<String, Vec<Successor>>,
}

impl TransitionModel {
    /// Weighted entry points: the first token of every training sentence.
    pub fn starts(&self) -> &[Successor] {
        &self.starts
    }

    /// Observed successors of `state`, or `None` for a terminal state.
    pub fn successors(&self, state: &str) -> Option<&[Successor]> {
        self.transitions
            .get(state)
            .map(Vec::as_slice)
            .filter(|options| !options.is_empty())
    }

    /// Total observations leaving `state`.
    pub fn weight(&self, state: &str) -> u32 {
        self.successors(state)
            .map(|options| options.iter().map(|s| s.count).sum())
            .unwrap_or(0)
    }

    /// Source text of a back-reference.
    pub fn sentence(&self, id: SentenceId) -> Option<&str> {
        self.sentences.get(id.0).map(String::as_str)
    }

    /// Iterate over every `(state, successors)` pair.
    pub fn states(&self) -> impl Iterator<Item = (&str, &[Successor])> {
        self.transitions
            .iter()
            .map(|(state, options)| (state.as_str(), options.as_slice()))
    }

    pub fn state_count(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }
}

/// Builds transition models from raw sentences.
pub struct ChainBuilder;

impl ChainBuilder {
    /// Build a model from an ordered corpus.
    ///
    /// Sentences are split on whitespace; blank sentences contribute
    /// nothing. For every adjacent pair `(a, b)` the token `b` is recorded
    /// as a successor of `a` together with a back-reference to the
    /// sentence it came from.
    pub fn build<S: AsRef<str>>(corpus: &[S]) -> TransitionModel {
        let mut model = TransitionModel {
            sentences: corpus.iter().map(|s| s.as_ref().to_string()).collect(),
            ..TransitionModel::default()
        };

        for (index, sentence) in corpus.iter().enumerate() {
            let source = SentenceId(index);
            let tokens: Vec<&str> = sentence.as_ref().split_whitespace().collect();

            let Some(first) = tokens.first() else {
                continue;
            };
            add_successor(&mut model.starts, first, source);

            for pair in tokens.windows(2) {
                let options = model.transitions.entry(pair[0].to_string()).or_default();
                add_successor(options, pair[1], source);
            }
        }

        model
    }
}

/// Record one observation, merging with an existing entry for the same token.
fn add_successor(options: &mut Vec<Successor>, token: &str, source: SentenceId) {
    if let Some(entry) = options.iter_mut().find(|s| s.token == token) {
        entry.observe(source);
    } else {
        options.push(Successor::new(token, source));
    }
}
