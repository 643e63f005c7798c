//! Runtime utilities for the provisioner.
#![allow(missing_docs)]
#![allow(clippy::uninlined_format_args)]

pub mod shutdown;

#[cfg(test)]
mod shutdown_test;
