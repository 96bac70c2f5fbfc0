//! # Mongoose Protocol
//!
//! Wire contract for the Mongoose sharding admin client.
//!
//! This crate provides:
//! - `Command` for order-preserving administrative commands
//! - The ordering hint envelope (`$pyhint`) and its decoder
//! - The response validator and typed response views
//! - Gateway endpoint paths and request parameters
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ## Key Invariants
//!
//! - A command keeps the field order it was built with, end to end
//! - The first field of a command is its name
//! - A response is only successful when its `ok` field is truthy

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod command;
mod endpoint;
mod error;
mod hint;
mod response;

pub use command::{ChunkCriteria, Command, CommandEncoding};
pub use endpoint::{CollectionAction, Endpoint, Method, Params};
pub use error::{ProtocolError, ProtocolResult};
pub use hint::{decode_ordered, encode_ordered, OrderedPair, PYHINT_KEY};
pub use response::{
    decode_body, is_truthy, validate, ConnectReply, ConnectionStats, CursorBatch, DatabaseEntry,
    DatabaseList, GlobalLock, MemoryStats, OpCounters, Response, ServerStatus, ShardEntry,
    ShardList, Validation, FALLBACK_MESSAGE,
};
