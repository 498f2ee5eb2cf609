//! Structured run logging: append-only JSONL for post-run analysis.

pub mod jsonl;
