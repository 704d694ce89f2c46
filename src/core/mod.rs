//! Core harness logic: declarations, inputs, lifecycle, reports.

pub mod classifier;
pub mod collector;
pub mod config;
pub mod error;
pub mod harness;
pub mod lifecycle;
pub mod literal;
pub mod parser;
pub mod report;
pub mod synthesizer;
pub mod types;
