/// Markov preview — run the generator offline against a corpus file.
///
/// Usage: markov_preview --input <corpus.txt> [--seed <text>] [--rng-seed <n>] [--count <n>]
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use markov_generator::core::handler::{GeneratorSettings, RequestHandler};
use markov_generator::schema::message::{GenerationRequest, GenerationResult};

#[derive(Debug, Parser)]
#[command(name = "markov_preview", about = "Generate sentences from a corpus file")]
struct Cli {
    /// Corpus file, one training sentence per line.
    #[arg(long)]
    input: PathBuf,
    /// Text that must appear in a source sentence of every result.
    #[arg(long)]
    seed: Option<String>,
    /// Fix the random source for reproducible output.
    #[arg(long)]
    rng_seed: Option<u64>,
    #[arg(long, default_value_t = 1)]
    count: usize,
    #[arg(long)]
    max_attempts: Option<u32>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let text = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read '{}'", cli.input.display()))?;
    let request = GenerationRequest {
        messages: text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        seed: cli.seed,
    };

    let mut settings = GeneratorSettings::default();
    if let Some(max_attempts) = cli.max_attempts {
        settings.max_attempts = max_attempts;
    }
    let mut handler = match cli.rng_seed {
        Some(seed) => RequestHandler::seeded(settings, seed),
        None => RequestHandler::new(settings),
    };

    println!(
        "Corpus: {} sentences from '{}'",
        request.messages.len(),
        cli.input.display()
    );
    for i in 0..cli.count {
        match handler.handle(&request) {
            GenerationResult::Sentence(sentence) => println!("[{}] {}", i + 1, sentence),
            GenerationResult::Failure(reason) => println!("[{}] (failed) {}", i + 1, reason),
        }
    }

    Ok(())
}
