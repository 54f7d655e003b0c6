#![forbid(unsafe_code)]

//! Supervisor for background data-collection modules plus the tracking
//! status engine that summarises the data they produce.

pub mod config;
pub mod errors;
pub mod models;
pub mod shutdown;
pub mod status;
pub mod supervisor;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
