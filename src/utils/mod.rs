//! Utility functions and helpers

pub mod files;
