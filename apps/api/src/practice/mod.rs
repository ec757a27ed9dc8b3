// Practice sessions: question deck, timer, answers, recording and the
// scorecard produced when a session completes.
// Scoring and question generation may use the LLM; everything else is local.

pub mod analyzer;
pub mod configurator;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod prompts;
pub mod recording;
pub mod registry;
pub mod responses;
pub mod runtime;
pub mod scoring;
pub mod sequencer;
pub mod session;
pub mod timer;
