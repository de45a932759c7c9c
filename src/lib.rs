pub mod api;
pub mod bad_connections;
pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod pool;
pub mod provisioner;
pub mod telemetry;
