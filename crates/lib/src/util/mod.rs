//! Shared utilities.
//!
//! Content hashing for cache invalidation, plus test helpers.

pub mod hash;

#[cfg(test)]
pub mod testutil;
