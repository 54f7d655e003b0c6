//! Tracking status: HTTP client, snapshot reduction, and publication.

pub mod board;
pub mod client;
pub mod engine;

pub use board::{PolledSnapshot, StatusBoard};
pub use client::StatusClient;
pub use engine::StatusEngine;
