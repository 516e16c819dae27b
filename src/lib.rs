//! Markov generator — a queue worker that trains a throwaway Markov chain
//! on each request's corpus and answers with one sentence that passes a
//! quality filter, or with the reason none did.

pub mod config;
pub mod core;
pub mod health;
pub mod schema;
pub mod worker;
