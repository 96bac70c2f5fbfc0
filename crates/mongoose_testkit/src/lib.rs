//! # Mongoose Testkit
//!
//! Test utilities for Mongoose.
//!
//! This crate provides:
//! - An in-memory gateway that answers the REST protocol and keeps cluster
//!   state (shards, sharded databases and collections, documents, cursors)
//! - Cluster fixtures
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mongoose_testkit::prelude::*;
//!
//! let gateway = sharded_cluster();
//! let reply = gateway.handle(Method::Post, "/admin/_cmd", &params);
//! assert_eq!(reply.status, 200);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod gateway;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::gateway::*;
    pub use crate::generators::*;
    pub use mongoose_protocol::{Method, Params};
}

pub use fixtures::*;
pub use gateway::*;
pub use generators::*;
