//! CLI subcommand implementations

pub mod prune;
pub mod stats;
