//! Deplab CLI - label container images with their dependency metadata.

pub mod commands;
pub mod output;
