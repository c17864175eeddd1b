//! Step resolution, handler dispatch and execution coordination for magnet.
//!
//! This crate defines the "ports" (store and collaborator traits) that the
//! infrastructure layer implements. It depends only on `magnet-types` --
//! never on `magnet-infra` or any database/IO crate.

pub mod ports;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;
