pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod event_sourcing;
pub mod metrics;
pub mod utils;
