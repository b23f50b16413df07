pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod games;
pub mod identity;
pub mod lifecycle;
pub mod metrics;
