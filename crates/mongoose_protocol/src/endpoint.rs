//! Gateway endpoints.

use std::fmt;

/// HTTP method used for a gateway call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Parameters travel in the query string.
    Get,
    /// Parameters travel as a form-encoded body.
    Post,
}

impl Method {
    /// Returns the method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request parameters, in the order they are sent.
pub type Params = Vec<(String, String)>;

/// A gateway endpoint.
///
/// Paths follow the gateway's routing rule: the last segment is the action
/// and always starts with `_`; a leading segment names the database and any
/// segments in between name the collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `POST /_connect`: open or name a connection.
    Connect,
    /// `GET /_hello`: liveness probe.
    Hello,
    /// `GET /_status`: server status of one shard.
    Status,
    /// `GET /_dbs`: databases on one shard.
    Databases,
    /// `POST /_mongos`: set the administrative entry point.
    Mongos,
    /// `POST /<db>/_cmd`: run a database command.
    Command {
        /// Target database.
        db: String,
    },
    /// `POST /<db>/_authenticate`: authenticate against a database.
    Authenticate {
        /// Target database.
        db: String,
    },
    /// `/<db>/<collection>/_<action>`: collection passthrough.
    Collection {
        /// Database name.
        db: String,
        /// Collection name.
        collection: String,
        /// Collection action.
        action: CollectionAction,
    },
}

/// Collection passthrough actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionAction {
    /// Query documents.
    Find,
    /// Fetch the next batch of a cursor.
    More,
    /// Insert documents.
    Insert,
    /// Update documents.
    Update,
    /// Remove documents.
    Remove,
}

impl CollectionAction {
    /// Returns the path segment for this action.
    pub fn segment(&self) -> &'static str {
        match self {
            CollectionAction::Find => "_find",
            CollectionAction::More => "_more",
            CollectionAction::Insert => "_insert",
            CollectionAction::Update => "_update",
            CollectionAction::Remove => "_remove",
        }
    }

    /// Returns the HTTP method the gateway expects for this action.
    pub fn method(&self) -> Method {
        match self {
            CollectionAction::Find | CollectionAction::More => Method::Get,
            _ => Method::Post,
        }
    }
}

impl Endpoint {
    /// Endpoint for a command against `db`.
    pub fn command(db: impl Into<String>) -> Self {
        Endpoint::Command { db: db.into() }
    }

    /// Endpoint for a collection action.
    pub fn collection(
        db: impl Into<String>,
        collection: impl Into<String>,
        action: CollectionAction,
    ) -> Self {
        Endpoint::Collection {
            db: db.into(),
            collection: collection.into(),
            action,
        }
    }

    /// Returns the HTTP method the gateway expects.
    pub fn method(&self) -> Method {
        match self {
            Endpoint::Hello | Endpoint::Status | Endpoint::Databases => Method::Get,
            Endpoint::Connect
            | Endpoint::Mongos
            | Endpoint::Command { .. }
            | Endpoint::Authenticate { .. } => Method::Post,
            Endpoint::Collection { action, .. } => action.method(),
        }
    }

    /// Returns the request path, starting with `/`.
    pub fn path(&self) -> String {
        match self {
            Endpoint::Connect => "/_connect".into(),
            Endpoint::Hello => "/_hello".into(),
            Endpoint::Status => "/_status".into(),
            Endpoint::Databases => "/_dbs".into(),
            Endpoint::Mongos => "/_mongos".into(),
            Endpoint::Command { db } => format!("/{db}/_cmd"),
            Endpoint::Authenticate { db } => format!("/{db}/_authenticate"),
            Endpoint::Collection {
                db,
                collection,
                action,
            } => format!("/{db}/{collection}/{}", action.segment()),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}
