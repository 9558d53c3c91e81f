//! Shared helpers that don't belong to a feature module.

pub mod logger;
