//! Evaluation document sources.
//!
//! Documents come either from local JSON files or from the evaluation
//! backend over HTTP.

pub mod client;
pub mod error;
pub mod loader;

pub use client::{ClientConfig, EvaluationClient};
pub use loader::load_from_file;
