//! In-memory Mongoose gateway.
//!
//! [`FakeGateway`] answers the same paths as the REST gateway and keeps a
//! small model of a sharded cluster behind them, so client code can run
//! whole administration workflows without a network or a mongod.
//!
//! Commands are decoded the way the gateway decodes them: a `$pyhint`
//! envelope yields its pairs in order, and a plain object yields its keys in
//! the order given by [`KeyOrder`]. With [`KeyOrder::Sorted`] a plain
//! multi-field command can lose its leading name key, which is exactly the
//! failure the ordering hint exists to prevent.

use mongoose_protocol::{decode_ordered, is_truthy, Command, Method, Params, PYHINT_KEY};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Reply to `/_hello`.
pub const HELLO_MESSAGE: &str = "Uh, we had a slight weapons malfunction, but uh... \
everything's perfectly all right now. We're fine. We're all fine here now, \
thank you. How are you?";

/// Error for a localhost shard added without `allowLocal`.
pub const LOCALHOST_SHARD_ERROR: &str = "can't use localhost as a shard since all shards need to \
communicate. either use all shards and configdbs in localhost or all in actual IPs";

/// Documents per batch when the request names no `batch_size`.
pub const DEFAULT_BATCH_SIZE: usize = 15;

/// Address reported by `{netstat: 1}` unless overridden.
pub const DEFAULT_CONFIG_SERVER: &str = "localhost:27019";

const ADMIN_COMMANDS: &[&str] = &[
    "netstat",
    "listshards",
    "addshard",
    "enablesharding",
    "moveprimary",
    "shardcollection",
    "shard",
    "movechunk",
    "getShardVersion",
];

/// A reply from the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReply {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl GatewayReply {
    /// A `200` reply with a JSON body.
    pub fn json(value: Value) -> Self {
        Self {
            status: 200,
            body: value.to_string(),
        }
    }

    /// A `200` reply reporting `{"ok": 0, "errmsg": message}`.
    pub fn error(message: impl Into<String>) -> Self {
        Self::json(json!({"ok": 0, "errmsg": message.into()}))
    }

    /// A reply with an arbitrary status and body.
    pub fn raw(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    fn not_found(path: &str) -> Self {
        Self::raw(404, format!("Script Not Found: {path}"))
    }

    /// Parses the body as JSON.
    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// How the gateway orders the keys of a plain JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyOrder {
    /// Keys keep the order they were written in.
    #[default]
    Preserve,
    /// Keys come back sorted, as from an unordered dictionary.
    Sorted,
}

/// A command as the gateway decoded it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedCommand {
    /// Database the command was sent to.
    pub db: String,
    /// Decoded fields in the order the gateway saw them.
    pub fields: Vec<(String, Value)>,
    /// Whether the command arrived in a `$pyhint` envelope.
    pub hinted: bool,
}

impl ReceivedCommand {
    /// Returns the first key.
    pub fn name(&self) -> Option<&str> {
        self.fields.first().map(|(k, _)| k.as_str())
    }

    /// Returns the keys in order.
    pub fn keys(&self) -> Vec<&str> {
        self.fields.iter().map(|(k, _)| k.as_str()).collect()
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone)]
struct ShardedCollection {
    key: Value,
    unique: bool,
    chunks: u64,
    version: u64,
}

#[derive(Debug, Default)]
struct OpCounts {
    insert: u64,
    query: u64,
    update: u64,
    delete: u64,
    getmore: u64,
    command: u64,
}

#[derive(Debug, Default)]
struct ClusterState {
    mongos: Option<String>,
    connections: BTreeMap<String, String>,
    shards: Vec<String>,
    primaries: BTreeMap<String, String>,
    collections: BTreeMap<String, ShardedCollection>,
    documents: BTreeMap<String, Vec<Value>>,
    cursors: HashMap<i64, VecDeque<Value>>,
    next_cursor: i64,
    next_oid: u64,
    counts: OpCounts,
    received: Vec<ReceivedCommand>,
    requests: Vec<(Method, String)>,
    injected: VecDeque<GatewayReply>,
}

/// In-memory stand-in for the REST gateway and the cluster behind it.
///
/// # Example
///
/// ```
/// use mongoose_protocol::Method;
/// use mongoose_testkit::FakeGateway;
///
/// let gateway = FakeGateway::new();
/// let reply = gateway.handle(Method::Get, "/_hello", &Vec::new());
/// assert_eq!(reply.body_json().unwrap()["ok"], 1);
/// ```
#[derive(Debug)]
pub struct FakeGateway {
    command_param: String,
    key_order: KeyOrder,
    config_server: String,
    users: Vec<(String, String, String)>,
    bare_insert_reply: bool,
    state: Mutex<ClusterState>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeGateway {
    /// Creates an empty cluster that reads commands from the `obj` parameter.
    pub fn new() -> Self {
        Self {
            command_param: "obj".to_string(),
            key_order: KeyOrder::Preserve,
            config_server: DEFAULT_CONFIG_SERVER.to_string(),
            users: Vec::new(),
            bare_insert_reply: false,
            state: Mutex::new(ClusterState {
                next_cursor: 1,
                ..ClusterState::default()
            }),
        }
    }

    /// Reads commands from `param` instead of `obj`.
    #[must_use]
    pub fn with_command_param(mut self, param: impl Into<String>) -> Self {
        self.command_param = param.into();
        self
    }

    /// Sets how plain JSON objects are ordered on decode.
    #[must_use]
    pub fn with_key_order(mut self, key_order: KeyOrder) -> Self {
        self.key_order = key_order;
        self
    }

    /// Sets the address reported by `{netstat: 1}`.
    #[must_use]
    pub fn with_config_server(mut self, address: impl Into<String>) -> Self {
        self.config_server = address.into();
        self
    }

    /// Registers a user that `_authenticate` accepts on `db`.
    #[must_use]
    pub fn with_user(
        mut self,
        db: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.users.push((db.into(), username.into(), password.into()));
        self
    }

    /// Replies to `_insert` with only `oids` and `status`, without `ok`.
    ///
    /// This is how sleepy.mongoose itself answers inserts.
    #[must_use]
    pub fn with_bare_insert_reply(mut self) -> Self {
        self.bare_insert_reply = true;
        self
    }

    /// Registers a shard directly, without an `addshard` command.
    #[must_use]
    pub fn with_shard(self, host: impl Into<String>) -> Self {
        self.state.lock().shards.push(host.into());
        self
    }

    /// Queues a reply returned verbatim by the next request.
    pub fn push_reply(&self, reply: GatewayReply) {
        self.state.lock().injected.push_back(reply);
    }

    /// Returns the registered shards in the order they were added.
    pub fn shards(&self) -> Vec<String> {
        self.state.lock().shards.clone()
    }

    /// Returns the mongos set through `/_mongos`.
    pub fn mongos(&self) -> Option<String> {
        self.state.lock().mongos.clone()
    }

    /// Returns the primary shard of a sharding-enabled database.
    pub fn primary_of(&self, db: &str) -> Option<String> {
        self.state.lock().primaries.get(db).cloned()
    }

    /// Returns true if `ns` has been sharded.
    pub fn is_sharded(&self, ns: &str) -> bool {
        self.state.lock().collections.contains_key(ns)
    }

    /// Returns the shard key of a sharded collection.
    pub fn shard_key(&self, ns: &str) -> Option<Value> {
        self.state.lock().collections.get(ns).map(|c| c.key.clone())
    }

    /// Returns the number of chunks of a sharded collection.
    pub fn chunk_count(&self, ns: &str) -> Option<u64> {
        self.state.lock().collections.get(ns).map(|c| c.chunks)
    }

    /// Returns the documents stored in `ns`.
    pub fn documents(&self, ns: &str) -> Vec<Value> {
        self.state
            .lock()
            .documents
            .get(ns)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns every command received, in arrival order.
    pub fn received_commands(&self) -> Vec<ReceivedCommand> {
        self.state.lock().received.clone()
    }

    /// Returns the method and path of every request, in arrival order.
    pub fn requests(&self) -> Vec<(Method, String)> {
        self.state.lock().requests.clone()
    }

    /// Returns the number of requests handled.
    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Handles one request.
    ///
    /// The last path segment is the action and must start with `_`; a
    /// leading segment names the database and the segments in between name
    /// the collection. Unknown actions get a `404`.
    pub fn handle(&self, method: Method, path: &str, params: &Params) -> GatewayReply {
        let mut state = self.state.lock();
        state.requests.push((method, path.to_string()));
        if let Some(reply) = state.injected.pop_front() {
            return reply;
        }

        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        let Some((action, rest)) = parts.split_last() else {
            return GatewayReply::not_found(path);
        };
        if !action.starts_with('_') {
            return GatewayReply::not_found(path);
        }
        let db = rest.first().copied();
        let collection = (rest.len() > 1).then(|| rest[1..].join("."));

        let needs_post = matches!(
            *action,
            "_connect" | "_mongos" | "_cmd" | "_authenticate" | "_insert" | "_update" | "_remove"
        );
        let needs_get = matches!(*action, "_find" | "_more");
        if needs_post && method != Method::Post {
            return GatewayReply::error(format!("{action} must be a POST request"));
        }
        if needs_get && method != Method::Get {
            return GatewayReply::error(format!("{action} must be a GET request"));
        }

        let request = Request { params, db, collection };
        let result = match *action {
            "_hello" => Ok(json!({"ok": 1, "msg": HELLO_MESSAGE})),
            "_connect" => self.connect(&mut state, &request),
            "_mongos" => self.set_mongos(&mut state, &request),
            "_status" => self.status(&state, &request),
            "_dbs" => self.databases(&state, &request),
            "_authenticate" => self.authenticate(&request),
            "_cmd" => self.command(&mut state, &request),
            "_find" => self.find(&mut state, &request),
            "_more" => self.more(&mut state, &request),
            "_insert" => self.insert(&mut state, &request),
            "_update" => self.update(&mut state, &request),
            "_remove" => self.remove(&mut state, &request),
            _ => return GatewayReply::not_found(path),
        };

        match result {
            Ok(value) => GatewayReply::json(value),
            Err(message) => GatewayReply::error(message),
        }
    }

    // Parameter decoding

    fn decode_fields(&self, text: &str) -> Result<(Vec<(String, Value)>, bool), String> {
        let value: Value =
            serde_json::from_str(text).map_err(|_| format!("couldn't parse json: {text}"))?;
        if value.get(PYHINT_KEY).is_some() {
            let fields = decode_ordered(&value).ok_or_else(|| format!("bad hint: {text}"))?;
            return Ok((fields, true));
        }
        let fields = match self.key_order {
            KeyOrder::Preserve => serde_json::from_str::<Command>(text)
                .map_err(|_| format!("expected an object: {text}"))?
                .fields()
                .to_vec(),
            KeyOrder::Sorted => match value {
                Value::Object(map) => {
                    let mut fields: Vec<_> = map.into_iter().collect();
                    fields.sort_by(|a, b| a.0.cmp(&b.0));
                    fields
                }
                _ => return Err(format!("expected an object: {text}")),
            },
        };
        Ok((fields, false))
    }

    fn decode_document(&self, text: &str) -> Result<Value, String> {
        let value: Value =
            serde_json::from_str(text).map_err(|_| format!("couldn't parse json: {text}"))?;
        if value.get(PYHINT_KEY).is_some() {
            let (fields, _) = self.decode_fields(text)?;
            return Ok(Value::Object(fields.into_iter().collect()));
        }
        Ok(value)
    }

    // Connection endpoints

    fn connect(&self, state: &mut ClusterState, request: &Request<'_>) -> Result<Value, String> {
        let server = request
            .param("server")
            .unwrap_or("mongodb://localhost:27017")
            .to_string();
        let name = request.param("name").unwrap_or("default").to_string();
        state.connections.insert(name.clone(), server.clone());
        Ok(json!({"ok": 1, "server": server, "name": name}))
    }

    fn set_mongos(&self, state: &mut ClusterState, request: &Request<'_>) -> Result<Value, String> {
        let server = request
            .param("server")
            .filter(|s| !s.is_empty())
            .ok_or("no server given")?;
        state.mongos = Some(server.to_string());
        Ok(json!({"ok": 1, "server": server}))
    }

    fn known_server<'s>(
        &self,
        state: &ClusterState,
        request: &'s Request<'_>,
    ) -> Result<&'s str, String> {
        let server = request
            .param("server")
            .filter(|s| !s.is_empty())
            .ok_or("no server given")?;
        let known = state.mongos.as_deref() == Some(server)
            || state.shards.iter().any(|s| s == server)
            || state.connections.values().any(|s| s == server);
        if !known {
            return Err(format!("couldn't connect to server {server}"));
        }
        Ok(server)
    }

    fn status(&self, state: &ClusterState, request: &Request<'_>) -> Result<Value, String> {
        let server = self.known_server(state, request)?;
        let counts = &state.counts;
        Ok(json!({
            "ok": 1,
            "host": server,
            "uptime": 3600.0,
            "globalLock": {"totalTime": 3.6e9, "lockTime": 1.8e6, "ratio": 0.0005},
            "mem": {"resident": 12.0, "virtual": 180.0, "mapped": 64.0, "supported": true},
            "connections": {"current": 1 + state.connections.len(), "available": 818},
            "opcounters": {
                "insert": counts.insert,
                "query": counts.query,
                "update": counts.update,
                "delete": counts.delete,
                "getmore": counts.getmore,
                "command": counts.command,
            },
        }))
    }

    fn databases(&self, state: &ClusterState, request: &Request<'_>) -> Result<Value, String> {
        self.known_server(state, request)?;
        let mut names: BTreeMap<&str, usize> = BTreeMap::new();
        names.insert("admin", 0);
        for db in state.primaries.keys() {
            names.entry(db.as_str()).or_insert(0);
        }
        for (ns, docs) in &state.documents {
            let db = ns.split('.').next().unwrap_or(ns.as_str());
            *names.entry(db).or_insert(0) += docs.len();
        }
        let databases: Vec<Value> = names
            .iter()
            .map(|(name, count)| {
                json!({
                    "name": name,
                    "sizeOnDisk": (*count as f64) * 4096.0,
                    "empty": *count == 0,
                })
            })
            .collect();
        let total: usize = names.values().sum();
        Ok(json!({"ok": 1, "databases": databases, "totalSize": (total as f64) * 4096.0}))
    }

    fn authenticate(&self, request: &Request<'_>) -> Result<Value, String> {
        let db = request.db.ok_or("db must be defined")?;
        let username = request.param("username").ok_or("username must be defined")?;
        let password = request.param("password").ok_or("password must be defined")?;
        let accepted = self
            .users
            .iter()
            .any(|(d, u, p)| d == db && u == username && p == password);
        if !accepted {
            return Err("authentication failed".to_string());
        }
        Ok(json!({"ok": 1}))
    }

    // Commands

    fn command(&self, state: &mut ClusterState, request: &Request<'_>) -> Result<Value, String> {
        let db = request.db.ok_or("db must be defined")?;
        let text = request
            .param(&self.command_param)
            .ok_or_else(|| format!("missing {}", self.command_param))?;
        let (fields, hinted) = self.decode_fields(text)?;
        let command = ReceivedCommand {
            db: db.to_string(),
            fields,
            hinted,
        };
        state.received.push(command.clone());
        state.counts.command += 1;
        self.run_command(state, &command)
    }

    fn run_command(
        &self,
        state: &mut ClusterState,
        cmd: &ReceivedCommand,
    ) -> Result<Value, String> {
        let name = cmd.name().ok_or("no such cmd")?;
        if ADMIN_COMMANDS.contains(&name) && cmd.db != "admin" {
            return Err("access denied - use admin db".to_string());
        }
        match name {
            "netstat" => Ok(json!({"ok": 1, "configserver": self.config_server})),
            "listshards" => {
                let shards: Vec<Value> = state
                    .shards
                    .iter()
                    .enumerate()
                    .map(|(i, host)| json!({"_id": format!("shard{i:04}"), "host": host}))
                    .collect();
                Ok(json!({"ok": 1, "shards": shards}))
            }
            "addshard" => {
                let host = cmd.get_str("addshard").ok_or("no shard host given")?;
                let allow_local = cmd.get("allowLocal").is_some_and(is_truthy);
                if is_local(host) && !allow_local {
                    return Err(LOCALHOST_SHARD_ERROR.to_string());
                }
                if state.shards.iter().any(|s| s == host) {
                    return Err("host already used".to_string());
                }
                state.shards.push(host.to_string());
                Ok(json!({"ok": 1, "added": host}))
            }
            "enablesharding" => {
                let db = cmd.get_str("enablesharding").ok_or("no db given")?;
                if state.primaries.contains_key(db) {
                    return Err("already enabled".to_string());
                }
                let primary = state.shards.first().ok_or("no shards available")?.clone();
                state.primaries.insert(db.to_string(), primary);
                Ok(json!({"ok": 1}))
            }
            "moveprimary" => {
                let db = cmd.get_str("moveprimary").ok_or("no db given")?;
                let to = cmd
                    .get_str("to")
                    .ok_or("you have to specify where you want to move it")?;
                if !state.shards.iter().any(|s| s == to) {
                    return Err("that server isn't known to me".to_string());
                }
                let primary = state.primaries.get_mut(db).ok_or("can't find db!")?;
                if primary == to {
                    return Err("it is already the primary".to_string());
                }
                *primary = to.to_string();
                Ok(json!({"ok": 1, "primary": to}))
            }
            "shardcollection" => {
                let ns = cmd.get_str("shardcollection").ok_or("no ns")?;
                let db = ns.split('.').next().unwrap_or(ns);
                if !state.primaries.contains_key(db) {
                    return Err("sharding not enabled for db".to_string());
                }
                if state.collections.contains_key(ns) {
                    return Err("already sharded".to_string());
                }
                let key = cmd
                    .get("key")
                    .filter(|k| k.as_object().is_some_and(|o| !o.is_empty()))
                    .ok_or("no shard key")?
                    .clone();
                let unique = cmd.get("unique").is_some_and(is_truthy);
                state.collections.insert(
                    ns.to_string(),
                    ShardedCollection {
                        key,
                        unique,
                        chunks: 1,
                        version: 1,
                    },
                );
                Ok(json!({"ok": 1, "collectionsharded": ns}))
            }
            "shard" => {
                let ns = cmd.get_str("shard").ok_or("no ns")?;
                let coll = state
                    .collections
                    .get_mut(ns)
                    .ok_or("ns not sharded.  have to shard before can split")?;
                let point = cmd.get("find").or_else(|| cmd.get("middle"));
                if !point.is_some_and(Value::is_object) {
                    return Err("need to specify find or middle".to_string());
                }
                coll.chunks += 1;
                coll.version += 1;
                Ok(json!({"ok": 1}))
            }
            "movechunk" => {
                let ns = cmd.get_str("movechunk").ok_or("no ns")?;
                if !state.collections.contains_key(ns) {
                    return Err(
                        "ns not sharded.  have to shard before can move a chunk".to_string()
                    );
                }
                if !cmd.get("find").is_some_and(Value::is_object) {
                    return Err("need to specify find".to_string());
                }
                let to = cmd.get_str("to").ok_or("need to specify server to move shard to")?;
                if !state.shards.iter().any(|s| s == to) {
                    return Err("that server isn't known to me".to_string());
                }
                if let Some(coll) = state.collections.get_mut(ns) {
                    coll.version += 1;
                }
                Ok(json!({"ok": 1}))
            }
            "getShardVersion" => {
                let ns = cmd.get_str("getShardVersion").ok_or("no ns")?;
                let coll = state.collections.get(ns).ok_or("ns not sharded.")?;
                Ok(json!({"ok": 1, "version": coll.version, "unique": coll.unique}))
            }
            "drop" => {
                let coll = cmd.get_str("drop").ok_or("no collection given")?;
                let ns = format!("{}.{coll}", cmd.db);
                state.documents.remove(&ns).ok_or("ns not found")?;
                state.collections.remove(&ns);
                Ok(json!({"ok": 1, "ns": ns}))
            }
            _ => Err("no such cmd".to_string()),
        }
    }

    // Collection passthrough

    fn namespace(request: &Request<'_>) -> Result<String, String> {
        match (request.db, &request.collection) {
            (Some(db), Some(coll)) => Ok(format!("{db}.{coll}")),
            _ => Err("db and collection must be defined".to_string()),
        }
    }

    fn find(&self, state: &mut ClusterState, request: &Request<'_>) -> Result<Value, String> {
        let ns = Self::namespace(request)?;
        let criteria = match request.param("criteria") {
            Some(text) => self.decode_document(text)?,
            None => json!({}),
        };
        let fields = request
            .param("fields")
            .map(|text| self.decode_document(text))
            .transpose()?;
        let limit = request.number("limit")?.unwrap_or(0);
        let skip = request.number("skip")?.unwrap_or(0);
        let batch_size = request.number("batch_size")?.unwrap_or(DEFAULT_BATCH_SIZE);

        let mut matched: Vec<Value> = state
            .documents
            .get(&ns)
            .map(|docs| docs.iter().filter(|d| matches(d, &criteria)).cloned().collect())
            .unwrap_or_default();

        if let Some(text) = request.param("sort") {
            let (keys, _) = self.decode_fields(text)?;
            matched.sort_by(|a, b| compare_by(a, b, &keys));
        }

        let mut results: Vec<Value> = matched.into_iter().skip(skip).collect();
        if limit > 0 {
            results.truncate(limit);
        }
        if let Some(fields) = &fields {
            results = results.iter().map(|d| project(d, fields)).collect();
        }
        state.counts.query += 1;

        if request.flag("explain") {
            return Ok(json!({
                "ok": 1,
                "results": [{"cursor": "BasicCursor", "n": results.len(), "ns": ns}],
            }));
        }

        let id = state.next_cursor;
        state.next_cursor += 1;
        let mut cursor: VecDeque<Value> = results.into();
        let batch = take_batch(&mut cursor, batch_size);
        state.cursors.insert(id, cursor);
        Ok(json!({"ok": 1, "results": batch, "id": id}))
    }

    fn more(&self, state: &mut ClusterState, request: &Request<'_>) -> Result<Value, String> {
        let id: i64 = request
            .param("id")
            .ok_or("no cursor id given")?
            .parse()
            .map_err(|_| "invalid cursor id".to_string())?;
        let batch_size = request.number("batch_size")?.unwrap_or(DEFAULT_BATCH_SIZE);
        let cursor = state
            .cursors
            .get_mut(&id)
            .ok_or_else(|| format!("couldn't find the cursor with id {id}"))?;
        let batch = take_batch(cursor, batch_size);
        state.counts.getmore += 1;
        Ok(json!({"ok": 1, "results": batch, "id": id}))
    }

    fn insert(&self, state: &mut ClusterState, request: &Request<'_>) -> Result<Value, String> {
        let ns = Self::namespace(request)?;
        let docs = self.decode_document(request.param("docs").ok_or("missing docs")?)?;
        let docs = match docs {
            Value::Array(docs) => docs,
            doc @ Value::Object(_) => vec![doc],
            _ => return Err("docs must be an object or an array".to_string()),
        };

        let mut oids = Vec::with_capacity(docs.len());
        for doc in docs {
            let Value::Object(mut doc) = doc else {
                return Err("docs must be objects".to_string());
            };
            let id = match doc.get("_id") {
                Some(id) => id.clone(),
                None => {
                    state.next_oid += 1;
                    let id = json!({"$oid": format!("{:024x}", state.next_oid)});
                    doc.insert("_id".to_string(), id.clone());
                    id
                }
            };
            oids.push(id);
            state
                .documents
                .entry(ns.clone())
                .or_default()
                .push(Value::Object(doc));
            state.counts.insert += 1;
        }

        let mut reply = if self.bare_insert_reply {
            json!({"oids": oids})
        } else {
            json!({"ok": 1, "oids": oids})
        };
        if request.flag("safe") {
            reply["status"] = json!({"ok": 1, "err": null, "n": 0});
        }
        Ok(reply)
    }

    fn update(&self, state: &mut ClusterState, request: &Request<'_>) -> Result<Value, String> {
        let ns = Self::namespace(request)?;
        let criteria = request.param("criteria").ok_or("missing criteria")?;
        let criteria = self.decode_document(criteria)?;
        let newobj = self.decode_document(request.param("newobj").ok_or("missing newobj")?)?;
        let multi = request.flag("multi");

        let docs = state.documents.entry(ns).or_default();
        let mut updated = 0u64;
        for doc in docs.iter_mut().filter(|d| matches(d, &criteria)) {
            apply_update(doc, &newobj);
            updated += 1;
            if !multi {
                break;
            }
        }
        if updated == 0 && request.flag("upsert") {
            let mut doc = criteria.clone();
            apply_update(&mut doc, &newobj);
            if let Value::Object(map) = &mut doc {
                if !map.contains_key("_id") {
                    state.next_oid += 1;
                    map.insert(
                        "_id".to_string(),
                        json!({"$oid": format!("{:024x}", state.next_oid)}),
                    );
                }
            }
            docs.push(doc);
            updated = 1;
        }
        state.counts.update += 1;
        Ok(safety(request, updated))
    }

    fn remove(&self, state: &mut ClusterState, request: &Request<'_>) -> Result<Value, String> {
        let ns = Self::namespace(request)?;
        let criteria = match request.param("criteria") {
            Some(text) => self.decode_document(text)?,
            None => json!({}),
        };
        let docs = state.documents.entry(ns).or_default();
        let before = docs.len();
        docs.retain(|d| !matches(d, &criteria));
        let removed = (before - docs.len()) as u64;
        state.counts.delete += 1;
        Ok(safety(request, removed))
    }
}

struct Request<'p> {
    params: &'p Params,
    db: Option<&'p str>,
    collection: Option<String>,
}

impl<'p> Request<'p> {
    fn param(&self, key: &str) -> Option<&'p str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    // Any non-empty value counts as set.
    fn flag(&self, key: &str) -> bool {
        self.param(key).is_some_and(|v| !v.is_empty())
    }

    fn number(&self, key: &str) -> Result<Option<usize>, String> {
        self.param(key)
            .map(|v| v.parse().map_err(|_| format!("invalid {key}: {v}")))
            .transpose()
    }
}

fn is_local(host: &str) -> bool {
    host.starts_with("localhost") || host.starts_with("127.")
}

fn take_batch(cursor: &mut VecDeque<Value>, size: usize) -> Vec<Value> {
    let n = size.min(cursor.len());
    cursor.drain(..n).collect()
}

fn safety(request: &Request<'_>, n: u64) -> Value {
    if request.flag("safe") {
        json!({"ok": 1, "err": null, "n": n})
    } else {
        json!({"ok": 1})
    }
}

// Top-level equality only.
fn matches(doc: &Value, criteria: &Value) -> bool {
    match criteria.as_object() {
        Some(criteria) => criteria.iter().all(|(k, v)| doc.get(k) == Some(v)),
        None => true,
    }
}

fn project(doc: &Value, fields: &Value) -> Value {
    let Some(fields) = fields.as_object() else {
        return doc.clone();
    };
    let mut out = Map::new();
    if let Some(id) = doc.get("_id") {
        out.insert("_id".to_string(), id.clone());
    }
    for (key, include) in fields {
        if is_truthy(include) {
            if let Some(value) = doc.get(key) {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(out)
}

fn apply_update(doc: &mut Value, newobj: &Value) {
    match newobj.get("$set").and_then(Value::as_object) {
        Some(set) => {
            if let Value::Object(map) = doc {
                for (k, v) in set {
                    map.insert(k.clone(), v.clone());
                }
            }
        }
        None => {
            let id = doc.get("_id").cloned();
            *doc = newobj.clone();
            if let (Some(id), Value::Object(map)) = (id, doc) {
                map.insert("_id".to_string(), id);
            }
        }
    }
}

fn compare_by(a: &Value, b: &Value, keys: &[(String, Value)]) -> Ordering {
    for (key, direction) in keys {
        let ord = compare_values(a.get(key), b.get(key));
        let ord = if direction.as_i64() == Some(-1) { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
