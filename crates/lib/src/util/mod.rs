//! Shared utilities.
//!
//! Hashing, filesystem helpers and (in tests) fake collaborators.

pub mod fs;
pub mod hash;

#[cfg(test)]
pub mod testutil;
