pub mod chain;
pub mod handler;
pub mod sampler;
