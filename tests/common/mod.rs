//! Common test utilities for all integration tests.
//!
//! Provides an in-memory Vault and certificate fixtures.

#![allow(dead_code)]
#![allow(clippy::duplicate_mod)]

pub mod fixtures;
pub mod memory_vault;

pub use memory_vault::{Call, MemoryVault};
