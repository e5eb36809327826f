//! Typed host command modules.
//!
//! This module contains structs that implement `HostCommand` for each external
//! program kubeprep drives. Each struct maps Rust fields to the exact CLI flags
//! and environment variables expected by the program.

pub mod files;
pub mod packages;
pub mod system;
pub mod tools;
