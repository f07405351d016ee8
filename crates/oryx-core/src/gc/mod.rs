//! Tracing contract for the collector and the flattener
//!
//! Memory is reference counted, so the runtime core does not sweep. What it
//! provides is the contract a collector or a serializer needs:
//!
//! - **GcTraceable**: every runtime entity reports the values it references
//! - **Tracer**: the visitor receiving those references
//! - **LiveSet**: a cycle-safe marker computing everything reachable from roots
//! - **flatten**: an index-based copy of an object graph that keeps sharing
//!   and cycles intact
//!
//! # Example
//!
//! ```no_run
//! use oryx_core::{gc::LiveSet, Runtime};
//!
//! let runtime = Runtime::new();
//! let class = runtime.define_class("Node", None).unwrap();
//! let node = runtime.new_object(class).unwrap();
//!
//! let live = LiveSet::mark_roots([&node]);
//! assert!(live.contains(&node));
//! ```

mod flatten;
mod trace;

pub use flatten::{flatten, FlatGraph, FlatNode, NodeIndex};
pub use trace::{GcTraceable, LiveSet, Tracer};
