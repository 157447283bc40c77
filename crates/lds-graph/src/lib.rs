//! lds-graph: The node graph store of the discovery registry.
//!
//! This crate is the single mutation point for the registry tree. Every read
//! and write goes through [`GraphStore`], which holds the whole graph behind
//! one readers-writer lock and reports committed changes to a
//! [`ChangeListener`].

pub mod mutations;
pub mod queries;
pub mod store;
mod tree;

pub use store::{ChangeListener, GraphError, GraphStore, Result};
