//! # Mongoose Client
//!
//! Async administration client for sharded MongoDB clusters, speaking to the
//! cluster through the Mongoose REST gateway.
//!
//! This crate provides:
//! - Connection handle with configurable mongos and gateway addresses
//! - Shard, database and collection handles for the sharding commands
//! - Document passthrough (find, more, insert, update, remove)
//! - HTTP transport abstraction with a `reqwest` backend
//! - Mock and loopback transports for tests
//! - Callback adapter for continuation-style callers
//!
//! ## Architecture
//!
//! ```text
//! Collection / Database / Shard  (borrow)
//!             │
//!         Connection ── ClientConfig
//!             │
//!         Requester ── HttpTransport<C: HttpClient> | MockTransport
//!             │
//!          gateway
//! ```
//!
//! Every operation is one independent request whose reply is checked by the
//! response validator before it reaches the caller.
//!
//! ## Key Invariants
//!
//! - A reply whose `ok` is falsy is always an error
//! - Invalid arguments fail before any request is made
//! - Order-sensitive commands keep their field order end to end
//! - Handles never outlive or mutate their connection

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod callback;
mod collection;
mod config;
mod connection;
mod database;
mod error;
mod http;
mod shard;
mod transport;

pub use callback::on_complete;
pub use collection::{Collection, FindOptions, SortOrder, UpdateOptions};
pub use config::{
    ClientConfig, HostPort, DEFAULT_GATEWAY_URL, DEFAULT_MONGOS_HOST, DEFAULT_MONGOS_PORT,
};
pub use connection::Connection;
pub use database::Database;
pub use error::{ClientError, ClientResult};
#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
pub use http::{HttpClient, HttpRequest, HttpResponse, LoopbackClient, LoopbackServer};
pub use shard::Shard;
pub use transport::{check_response, HttpTransport, MockTransport, RecordedRequest, Requester};

pub use mongoose_protocol::{
    ChunkCriteria, Command, CommandEncoding, ConnectReply, CursorBatch, DatabaseList, Method,
    Params, Response, ServerStatus, ShardList,
};
