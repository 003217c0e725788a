//! Core types and background services for the Bobine media server.
//!
//! This crate carries everything the delivery core shares: configuration,
//! logging, the domain models, the collaborator traits behind which the
//! persistence layer lives, host resource probes, and the periodic
//! monitoring loops (metrics collector, alert evaluator, daily rollup).

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod probe;
pub mod repository;
pub mod service;

pub use config::Config;
pub use error::{Error, Result};
