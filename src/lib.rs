pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod observability;
pub mod processing;
pub mod server;
pub mod storage;
pub mod types;

// Use cases between the HTTP surface and the store
pub mod app;

// Domain data shapes shared across layers
pub mod domain;
