//! Database handles.

use crate::collection::Collection;
use crate::connection::Connection;
use crate::error::{ClientError, ClientResult};
use crate::transport::Requester;
use mongoose_protocol::{Command, Endpoint, Response};

/// A database in the cluster.
///
/// Only a name: the database may or may not exist on the server.
pub struct Database<'a, R: Requester> {
    connection: &'a Connection<R>,
    name: String,
}

impl<'a, R: Requester> Database<'a, R> {
    pub(crate) fn new(connection: &'a Connection<R>, name: impl Into<String>) -> Self {
        Self {
            connection,
            name: name.into(),
        }
    }

    /// Returns the database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the connection this handle borrows.
    pub fn connection(&self) -> &'a Connection<R> {
        self.connection
    }

    /// Returns a handle to collection `name` in this database.
    pub fn collection(&self, name: &str) -> Collection<'a, R> {
        Collection::new(self.connection, &self.name, name)
    }

    /// Enables sharding on this database.
    pub async fn shard(&self) -> ClientResult<Response> {
        self.connection
            .admin_command(&Command::enablesharding(&self.name))
            .await
    }

    /// Moves this database's primary to the shard at `to`.
    pub async fn move_primary(&self, to: &str) -> ClientResult<Response> {
        if to.is_empty() {
            return Err(ClientError::invalid_argument("target shard required"));
        }
        self.connection
            .admin_command(&Command::moveprimary(&self.name, to))
            .await
    }

    /// Runs `command` against this database.
    pub async fn command(&self, command: &Command) -> ClientResult<Response> {
        self.connection.command(&self.name, command).await
    }

    /// Authenticates the gateway connection against this database.
    pub async fn authenticate(&self, username: &str, password: &str) -> ClientResult<Response> {
        if username.is_empty() {
            return Err(ClientError::invalid_argument("username must be defined"));
        }
        if password.is_empty() {
            return Err(ClientError::invalid_argument("password must be defined"));
        }
        let params = vec![
            ("username".to_string(), username.to_string()),
            ("password".to_string(), password.to_string()),
        ];
        self.connection
            .call(&Endpoint::Authenticate { db: self.name.clone() }, params)
            .await
    }
}
