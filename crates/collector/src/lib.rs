//! Docker stats collector
//!
//! Receives periodic image usage reports from agents, keeps the latest
//! one per instance, renders them, and triggers prunes on request.

pub mod api;
pub mod config;
pub mod dashboard;
