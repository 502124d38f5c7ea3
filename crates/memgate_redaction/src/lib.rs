//! memgate_redaction
//!
//! A single ordered pass over a fixed pattern table that turns raw
//! retrieved text into cleaned text plus risk and confidence scores.
//! Determinism matters here: identical input must always produce
//! identical output, since this result is what gets published to
//! telemetry and gated behind consent.

mod engine;
mod rules;

pub use engine::{Confidence, RedactionEngine, RedactionResult, RiskLevel};
pub use rules::{RedactionRule, Replacement, Severity};
