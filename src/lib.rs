// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # cogbridge
//!
//! A symbolic memory bridge between a client host and a graph-based
//! reasoning server speaking a line-oriented command protocol.
//!
//! ## Architecture
//!
//! - **Transport** (`transport`): non-blocking TCP line channel with a file-per-command fallback queue
//! - **Atoms** (`atom`, `cache`): typed nodes and ordered links, deduplicated per `(kind, name)`
//! - **Connector** (`connector`): transport + cache facade with best-effort remote notification
//! - **Notation** (`notation`): glyph ↔ identifier translation between client and server notation
//! - **Canonicalization** (`reason`): e-graph simplification via `egg`, used for structural distance
//! - **Memory** (`memory`): spaces, evolution log, pattern search, compression, neighbors, snapshots
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use cogbridge::config::BridgeConfig;
//! use cogbridge::connector::Connector;
//! use cogbridge::memory::SymbolicMemory;
//!
//! let connector = Arc::new(Connector::new(BridgeConfig::default()));
//! connector.connect().unwrap();
//! let cat = connector.create_concept_node("cat").unwrap();
//! let animal = connector.create_concept_node("animal").unwrap();
//! connector.create_inheritance_link(cat, animal).unwrap();
//!
//! let memory = SymbolicMemory::new(Arc::clone(&connector));
//! memory.store("user", "cat").unwrap();
//! println!("{}", memory.retrieve("user", "*"));
//! ```

pub mod atom;
pub mod cache;
pub mod config;
pub mod connector;
pub mod error;
pub mod memory;
pub mod notation;
pub mod reason;
pub mod sexpr;
pub mod transport;
