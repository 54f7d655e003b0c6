//! Domain model module declarations.

pub mod bucket;
pub mod module;
pub mod snapshot;
