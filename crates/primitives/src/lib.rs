//! Core primitives shared by the provisioner crates.
/// Bounded retry helpers
pub mod retries;
