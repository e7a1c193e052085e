//! Scoring Engine for kolpulse.
//!
//! Converts post text, plus an optional result from the external Analyzer,
//! into record-shaped scores. Analyzer labels are quantized; text scored
//! without an Analyzer goes through a deterministic lexicon classifier; an
//! unreachable Analyzer is replaced by a bounded random fallback.

pub mod analyzer;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod keywords;
pub mod lexicon;
pub mod policy;

pub use analyzer::{Analyzer, AnalyzerOutput, HttpAnalyzer};
pub use engine::{Provenance, ScoredPost, ScoringEngine};
pub use error::ScoringError;
pub use fallback::FallbackGenerator;
pub use keywords::extract_keywords;
pub use policy::Scores;
