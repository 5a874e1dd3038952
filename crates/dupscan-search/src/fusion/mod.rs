//! Turning final overlap scores into something a reader can act on.

pub mod risk;

pub use risk::{DuplicateRisk, classify_risk};
