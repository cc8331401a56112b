#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

//! Core implements the deploy pipeline: sort, inventory load/save, the mutator chain, the
//! deploy-once filter, the applier, and the pruner. Cluster I/O is a trait boundary
//! ([`client::Getter`]/[`client::ClusterClient`]/[`client::InventoryBackend`]); the `cli` crate
//! wires a real `kube::Client` behind it.

pub mod applier;
pub mod checksum;
pub mod client;
pub mod driver;
pub mod error;
pub mod filter;
pub mod generator;
pub mod image;
pub mod inventory;
pub mod mutators;
pub mod podwalk;
pub mod prune;
pub mod sort;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{Error, Result};
