//! Technology Intelligence Radar
//!
//! Core library: deterministic analytics kernels, read-only repositories
//! over the patent and project stores, remote-API adapters, the eight panel
//! engines, and the request orchestrator.

use std::sync::Arc;

pub mod adapters;
pub mod analytics;
pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::Config;
pub use services::{DataContext, RadarService};

/// Application shared state.
///
/// Rust's type system is the DI container: the immutable config plus one
/// orchestrator, both cheap to clone behind Arc. Repository handles and
/// adapter clients are built per request in the `DataContext`.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub radar_service: Arc<RadarService>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let radar_service = Arc::new(RadarService::new(config.clone()));
        Self { config, radar_service }
    }
}
