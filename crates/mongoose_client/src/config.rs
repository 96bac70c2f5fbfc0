//! Configuration for the client.

use crate::error::ClientError;
use mongoose_protocol::CommandEncoding;
use std::fmt;
use std::str::FromStr;

/// Default mongos host.
pub const DEFAULT_MONGOS_HOST: &str = "localhost";
/// Default mongos port.
pub const DEFAULT_MONGOS_PORT: u16 = 27017;
/// Default gateway base URL.
pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:27080";

/// A `host:port` server address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostPort {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl HostPort {
    /// Creates a new address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for HostPort {
    fn default() -> Self {
        Self::new(DEFAULT_MONGOS_HOST, DEFAULT_MONGOS_PORT)
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for HostPort {
    type Err = ClientError;

    /// Parses `host[:port]`. An empty string is the default address and a
    /// missing port is the default port.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::default());
        }

        match s.rsplit_once(':') {
            None => Ok(Self::new(s, DEFAULT_MONGOS_PORT)),
            Some((host, "")) if !host.is_empty() => Ok(Self::new(host, DEFAULT_MONGOS_PORT)),
            Some((host, port)) if !host.is_empty() => {
                let port = port.parse().map_err(|_| {
                    ClientError::invalid_argument(format!("invalid port in address: {s}"))
                })?;
                Ok(Self::new(host, port))
            }
            Some(_) => Err(ClientError::invalid_argument(format!(
                "missing host in address: {s}"
            ))),
        }
    }
}

/// Configuration for a client connection.
///
/// Read once at construction; there is no process-wide default state.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Administrative entry point (mongos) of the cluster.
    pub mongos: HostPort,
    /// Base URL of the REST gateway, including scheme.
    pub gateway_url: String,
    /// How commands are encoded into the request body.
    pub encoding: CommandEncoding,
    /// Name of the body parameter carrying the command JSON.
    pub command_param: String,
    /// Database that administrative commands run against.
    pub admin_db: String,
    /// Named gateway connection to use, sent as `name` on every request.
    pub connection_name: Option<String>,
}

impl ClientConfig {
    /// Creates a configuration for the given mongos with all other defaults.
    pub fn new(mongos: HostPort) -> Self {
        Self {
            mongos,
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            encoding: CommandEncoding::default(),
            command_param: "obj".to_string(),
            admin_db: "admin".to_string(),
            connection_name: None,
        }
    }

    /// Sets the gateway base URL. A trailing `/` is dropped.
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.gateway_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Sets the command encoding.
    pub fn with_encoding(mut self, encoding: CommandEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Sets the body parameter name carrying the command JSON.
    pub fn with_command_param(mut self, param: impl Into<String>) -> Self {
        self.command_param = param.into();
        self
    }

    /// Sets the database administrative commands run against.
    pub fn with_admin_db(mut self, db: impl Into<String>) -> Self {
        self.admin_db = db.into();
        self
    }

    /// Uses a named gateway connection.
    pub fn with_connection_name(mut self, name: impl Into<String>) -> Self {
        self.connection_name = Some(name.into());
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(HostPort::default())
    }
}
