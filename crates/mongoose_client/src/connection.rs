//! Connection to a cluster through the gateway.

use crate::collection::Collection;
use crate::config::{ClientConfig, HostPort};
use crate::database::Database;
use crate::error::{ClientError, ClientResult};
use crate::shard::Shard;
use crate::transport::Requester;
use mongoose_protocol::{Command, Endpoint, Method, Params, Response};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Encodes a value as a JSON request parameter.
pub(crate) fn json_param<T: Serialize + ?Sized>(
    key: &str,
    value: &T,
) -> ClientResult<(String, String)> {
    let text =
        serde_json::to_string(value).map_err(|e| ClientError::Encoding(e.to_string()))?;
    Ok((key.to_string(), text))
}

/// A connection to a sharded cluster through the REST gateway.
///
/// Holds the administrative endpoint (mongos) and the transport. Shard,
/// database and collection handles borrow the connection; they never own
/// it.
///
/// # Example
///
/// ```
/// use mongoose_client::{ClientConfig, Connection, MockTransport};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let conn = Connection::new(ClientConfig::default(), MockTransport::new());
/// let db = conn.database("test");
/// db.shard().await.unwrap();
/// db.collection("users").shard(serde_json::json!({"x": 1}), None).await.unwrap();
/// assert_eq!(conn.requester().call_count(), 2);
/// # });
/// ```
pub struct Connection<R: Requester> {
    requester: Arc<R>,
    config: ClientConfig,
}

#[cfg(feature = "reqwest")]
impl Connection<crate::transport::HttpTransport<crate::http::ReqwestClient>> {
    /// Creates a connection that talks to the configured gateway over HTTP.
    pub fn open(config: ClientConfig) -> ClientResult<Self> {
        let client = crate::http::ReqwestClient::new()?;
        let transport = crate::transport::HttpTransport::new(config.gateway_url.clone(), client);
        Ok(Self::new(config, transport))
    }
}

impl<R: Requester> Connection<R> {
    /// Creates a connection using `requester` for all gateway calls.
    pub fn new(config: ClientConfig, requester: R) -> Self {
        Self::with_shared(config, Arc::new(requester))
    }

    /// Creates a connection sharing an existing requester.
    pub fn with_shared(config: ClientConfig, requester: Arc<R>) -> Self {
        Self { requester, config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the mongos address.
    pub fn mongos(&self) -> &HostPort {
        &self.config.mongos
    }

    /// Returns the gateway base URL.
    pub fn gateway_url(&self) -> &str {
        &self.config.gateway_url
    }

    /// Returns the requester.
    pub fn requester(&self) -> &R {
        &self.requester
    }

    /// Points the connection at a different mongos.
    ///
    /// Takes `&mut self`: no request borrowing this connection can be in
    /// flight while it changes. Call [`Connection::set_mongos`] afterwards to
    /// tell the gateway.
    pub fn retarget(&mut self, mongos: HostPort) {
        debug!(from = %self.config.mongos, to = %mongos, "retargeting mongos");
        self.config.mongos = mongos;
    }

    fn with_name(&self, mut params: Params) -> Params {
        if let Some(name) = &self.config.connection_name {
            if !params.iter().any(|(k, _)| k == "name") {
                params.push(("name".to_string(), name.clone()));
            }
        }
        params
    }

    /// Sends a raw request to the gateway.
    pub async fn send(&self, method: Method, path: &str, params: Params) -> ClientResult<Response> {
        let params = self.with_name(params);
        self.requester.request(method, path, params).await
    }

    /// Sends a GET request to the gateway.
    pub async fn get(&self, path: &str, params: Params) -> ClientResult<Response> {
        self.send(Method::Get, path, params).await
    }

    /// Sends a POST request to the gateway.
    pub async fn post(&self, path: &str, params: Params) -> ClientResult<Response> {
        self.send(Method::Post, path, params).await
    }

    pub(crate) async fn call(&self, endpoint: &Endpoint, params: Params) -> ClientResult<Response> {
        self.send(endpoint.method(), &endpoint.path(), params).await
    }

    /// Runs `command` against database `db`.
    pub async fn command(&self, db: &str, command: &Command) -> ClientResult<Response> {
        if db.is_empty() {
            return Err(ClientError::invalid_argument("database name required"));
        }
        let body = command.encode(self.config.encoding)?;
        debug!(db, command = ?command.name(), "running command");
        let params = vec![(self.config.command_param.clone(), body)];
        self.call(&Endpoint::command(db), params).await
    }

    /// Runs `command` against the admin database.
    pub async fn admin_command(&self, command: &Command) -> ClientResult<Response> {
        self.command(&self.config.admin_db, command).await
    }

    /// Tells the gateway which mongos to use.
    pub async fn set_mongos(&self) -> ClientResult<Response> {
        let params = vec![("server".to_string(), self.config.mongos.to_string())];
        self.call(&Endpoint::Mongos, params).await
    }

    /// Opens a gateway connection to the mongos, optionally under `name`.
    ///
    /// The reply carries the `server` and `name` the gateway registered
    /// (see [`mongoose_protocol::ConnectReply`]).
    pub async fn connect(&self, name: Option<&str>) -> ClientResult<Response> {
        let mut params = vec![("server".to_string(), self.config.mongos.to_string())];
        if let Some(name) = name {
            params.push(("name".to_string(), name.to_string()));
        }
        self.call(&Endpoint::Connect, params).await
    }

    /// Checks that the gateway is up.
    pub async fn hello(&self) -> ClientResult<Response> {
        self.call(&Endpoint::Hello, Vec::new()).await
    }

    /// Gets the config server, `{netstat: 1}`.
    pub async fn get_config(&self) -> ClientResult<Response> {
        self.admin_command(&Command::netstat()).await
    }

    /// Lists the shards in the cluster, `{listshards: 1}`.
    pub async fn get_shards(&self) -> ClientResult<Response> {
        self.admin_command(&Command::listshards()).await
    }

    /// Returns a handle to the shard server at `server`.
    pub fn shard(&self, server: impl Into<String>) -> Shard<'_, R> {
        Shard::new(self, server)
    }

    /// Returns a handle to database `name`.
    pub fn database(&self, name: impl Into<String>) -> Database<'_, R> {
        Database::new(self, name)
    }

    /// Returns a handle to collection `name` in database `db`.
    pub fn collection(&self, db: &str, name: &str) -> Collection<'_, R> {
        Collection::new(self, db, name)
    }
}
