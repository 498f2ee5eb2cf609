//! Core shared infrastructure: configuration, errors, path helpers.

pub mod config;
pub mod errors;
pub mod paths;
