//! Shard handles.

use crate::connection::Connection;
use crate::error::{ClientError, ClientResult};
use crate::transport::Requester;
use mongoose_protocol::{Command, Endpoint, Response};

/// A single shard server of the cluster.
///
/// A new shard is unknown to the cluster until [`Shard::add`] registers it
/// with the mongos and config server:
///
/// 1. Start the shard server, say at `localhost:12345`.
/// 2. Create a handle with `connection.shard("localhost:12345")`.
/// 3. Call `add` to tell the cluster about it.
///
/// The handle holds nothing beyond its address.
pub struct Shard<'a, R: Requester> {
    connection: &'a Connection<R>,
    server: String,
}

impl<'a, R: Requester> Shard<'a, R> {
    pub(crate) fn new(connection: &'a Connection<R>, server: impl Into<String>) -> Self {
        Self {
            connection,
            server: server.into(),
        }
    }

    /// Returns the shard's address.
    pub fn server(&self) -> &str {
        &self.server
    }

    fn require_server(&self) -> ClientResult<()> {
        if self.server.is_empty() {
            return Err(ClientError::invalid_argument("shard server address required"));
        }
        Ok(())
    }

    /// Adds this shard to the cluster.
    ///
    /// `local` allows a shard on localhost and defaults to `false`; without
    /// it, a localhost shard is rejected with "can't use localhost as a
    /// shard since all shards need to communicate".
    pub async fn add(&self, local: Option<bool>) -> ClientResult<Response> {
        self.require_server()?;
        let command = Command::addshard(&self.server, local.unwrap_or(false));
        self.connection.admin_command(&command).await
    }

    /// Removes this shard from the cluster.
    ///
    /// The server does not support shard removal, so this always fails with
    /// [`ClientError::NotImplemented`] without sending anything.
    pub async fn remove(&self) -> ClientResult<Response> {
        Err(ClientError::NotImplemented(format!(
            "removing shard {} is not supported by the server",
            self.server
        )))
    }

    /// Gets this server's status: uptime, memory, lock, connection and
    /// operation statistics (see [`mongoose_protocol::ServerStatus`]).
    pub async fn status(&self) -> ClientResult<Response> {
        self.require_server()?;
        let params = vec![("server".to_string(), self.server.clone())];
        self.connection.call(&Endpoint::Status, params).await
    }

    /// Lists the databases on this shard (see
    /// [`mongoose_protocol::DatabaseList`]).
    pub async fn databases(&self) -> ClientResult<Response> {
        self.require_server()?;
        let params = vec![("server".to_string(), self.server.clone())];
        self.connection.call(&Endpoint::Databases, params).await
    }
}
