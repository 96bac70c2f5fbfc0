//! Response validation and typed response views.

use crate::error::{ProtocolError, ProtocolResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message reported when the gateway returns no payload at all.
pub const FALLBACK_MESSAGE: &str =
    "Something went very wrong. You'll probably need to restart the server.";

/// Outcome of validating a decoded response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    /// Whether the response reports success.
    pub ok: bool,
    /// Error message for failed responses, if the server gave one.
    pub message: Option<String>,
}

impl Validation {
    fn success() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }

    fn failure(message: Option<String>) -> Self {
        Self { ok: false, message }
    }
}

/// Returns true if a JSON value counts as "set" under the gateway's rules.
///
/// `null`, `false`, zero and the empty string are falsy; everything else,
/// including empty arrays and objects, is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn message_field(response: &Value, key: &str) -> Option<String> {
    match response.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Decodes a gateway reply body.
pub fn decode_body(body: &str) -> ProtocolResult<Value> {
    serde_json::from_str(body).map_err(ProtocolError::Decode)
}

/// Checks a decoded response for an explicit success indicator.
///
/// - no payload: failure with [`FALLBACK_MESSAGE`]
/// - falsy or missing `ok`: failure with a truthy `msg`, else `errmsg`, else
///   no message
/// - truthy `ok`: success
///
/// ```
/// use mongoose_protocol::validate;
/// use serde_json::json;
///
/// assert!(validate(Some(&json!({"ok": 1}))).ok);
///
/// let failed = validate(Some(&json!({"ok": 0, "errmsg": "no such cmd"})));
/// assert!(!failed.ok);
/// assert_eq!(failed.message.as_deref(), Some("no such cmd"));
/// ```
pub fn validate(response: Option<&Value>) -> Validation {
    let response = match response {
        None | Some(Value::Null) => {
            return Validation::failure(Some(FALLBACK_MESSAGE.to_string()));
        }
        Some(response) => response,
    };

    if response.get("ok").is_some_and(is_truthy) {
        return Validation::success();
    }

    let message = match response.get("msg") {
        Some(msg) if is_truthy(msg) => message_field(response, "msg"),
        _ => message_field(response, "errmsg"),
    };
    Validation::failure(message)
}

/// A decoded gateway response.
///
/// The payload is kept exactly as received; typed views are available
/// through [`Response::parse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Response(Value);

impl Response {
    /// Wraps a decoded payload.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Returns the raw payload.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the response, returning the raw payload.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Returns a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Validates this response.
    pub fn validation(&self) -> Validation {
        validate(Some(&self.0))
    }

    /// Decodes the payload into a typed view.
    pub fn parse<T: DeserializeOwned>(&self) -> ProtocolResult<T> {
        T::deserialize(&self.0).map_err(|e| ProtocolError::UnexpectedShape(e.to_string()))
    }
}

impl From<Value> for Response {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Reply to `POST /_connect`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ConnectReply {
    /// Server URI the gateway connected to.
    #[serde(default)]
    pub server: Option<String>,
    /// Name the connection was registered under.
    #[serde(default)]
    pub name: Option<String>,
}

/// Reply to `GET /_status`: a shard's server status.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    /// Seconds since the server started.
    #[serde(default)]
    pub uptime: Option<f64>,
    /// Global lock statistics.
    #[serde(default)]
    pub global_lock: Option<GlobalLock>,
    /// Memory usage in megabytes.
    #[serde(default)]
    pub mem: Option<MemoryStats>,
    /// Client connection counts.
    #[serde(default)]
    pub connections: Option<ConnectionStats>,
    /// Operation counters since startup.
    #[serde(default)]
    pub opcounters: Option<OpCounters>,
}

/// Global lock statistics.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalLock {
    /// Time since the lock was created, in microseconds.
    #[serde(default)]
    pub total_time: f64,
    /// Time the lock has been held, in microseconds.
    #[serde(default)]
    pub lock_time: f64,
    /// `lock_time / total_time`.
    #[serde(default)]
    pub ratio: f64,
}

/// Memory statistics.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MemoryStats {
    /// Resident memory.
    #[serde(default)]
    pub resident: f64,
    /// Virtual memory.
    #[serde(default, rename = "virtual")]
    pub virtual_size: f64,
    /// Memory-mapped data files.
    #[serde(default)]
    pub mapped: f64,
    /// Whether memory reporting is supported on this platform.
    #[serde(default)]
    pub supported: bool,
}

/// Client connection counts.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ConnectionStats {
    /// Open connections.
    #[serde(default)]
    pub current: u64,
    /// Connections still available.
    #[serde(default)]
    pub available: u64,
}

/// Operation counters.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct OpCounters {
    /// Inserts.
    #[serde(default)]
    pub insert: u64,
    /// Queries.
    #[serde(default)]
    pub query: u64,
    /// Updates.
    #[serde(default)]
    pub update: u64,
    /// Deletes.
    #[serde(default)]
    pub delete: u64,
    /// Cursor get-mores.
    #[serde(default)]
    pub getmore: u64,
}

/// Reply to `{listshards: 1}`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ShardList {
    /// Registered shards.
    #[serde(default)]
    pub shards: Vec<ShardEntry>,
}

/// A registered shard.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ShardEntry {
    /// Shard identifier.
    #[serde(default, rename = "_id")]
    pub id: Option<String>,
    /// Shard host address.
    #[serde(default)]
    pub host: String,
}

/// Reply to `GET /_dbs`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseList {
    /// Databases on the server.
    #[serde(default)]
    pub databases: Vec<DatabaseEntry>,
    /// Total on-disk size of all databases.
    #[serde(default)]
    pub total_size: Option<f64>,
}

/// A database known to a shard.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseEntry {
    /// Database name.
    pub name: String,
    /// On-disk size in bytes.
    #[serde(default)]
    pub size_on_disk: Option<f64>,
    /// Whether the database has no data.
    #[serde(default)]
    pub empty: Option<bool>,
}

/// Reply to `_find` and `_more`: one batch of documents.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CursorBatch {
    /// Documents in this batch.
    #[serde(default)]
    pub results: Vec<Value>,
    /// Cursor id to pass to `_more`.
    #[serde(default)]
    pub id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn decode_body_rejects_non_json() {
        assert_eq!(decode_body(r#"{"ok": 1}"#).unwrap(), json!({"ok": 1}));
        assert!(matches!(
            decode_body("<html></html>"),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn missing_response_uses_fallback() {
        let result = validate(None);
        assert!(!result.ok);
        assert_eq!(result.message.as_deref(), Some(FALLBACK_MESSAGE));

        assert_eq!(validate(Some(&Value::Null)), result);
    }

    #[test]
    fn falsy_ok_without_message() {
        let result = validate(Some(&json!({"ok": 0})));
        assert!(!result.ok);
        assert_eq!(result.message, None);

        let result = validate(Some(&json!({})));
        assert!(!result.ok);
        assert_eq!(result.message, None);
    }

    #[test]
    fn msg_takes_precedence() {
        let result = validate(Some(&json!({"ok": 0, "msg": "whoops", "errmsg": "other"})));
        assert_eq!(result.message.as_deref(), Some("whoops"));

        let result = validate(Some(&json!({"ok": 0, "msg": null, "errmsg": "other"})));
        assert_eq!(result.message.as_deref(), Some("other"));
    }

    #[test]
    fn falsy_msg_falls_back_to_errmsg() {
        let result = validate(Some(&json!({"ok": 0, "msg": "", "errmsg": "real error"})));
        assert_eq!(result.message.as_deref(), Some("real error"));

        let result = validate(Some(&json!({"ok": 0, "msg": 0, "errmsg": "real error"})));
        assert_eq!(result.message.as_deref(), Some("real error"));

        let result = validate(Some(&json!({"ok": 0, "msg": ""})));
        assert_eq!(result.message, None);
    }

    #[test]
    fn errmsg_used_without_msg() {
        let result = validate(Some(&json!({"ok": false, "errmsg": "whoops"})));
        assert!(!result.ok);
        assert_eq!(result.message.as_deref(), Some("whoops"));
    }

    #[test]
    fn truthy_ok_has_no_message() {
        for ok in [json!(1), json!(1.0), json!(true), json!("yes")] {
            let result = validate(Some(&json!({"ok": ok, "errmsg": "ignored"})));
            assert_eq!(result, Validation::success());
        }
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&Value::Null));
        assert!(is_truthy(&json!(-1)));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
    }

    #[test]
    fn non_string_message_is_rendered() {
        let result = validate(Some(&json!({"ok": 0, "errmsg": {"code": 13}})));
        assert_eq!(result.message.as_deref(), Some(r#"{"code":13}"#));
    }

    #[test]
    fn parse_server_status() {
        let response = Response::new(json!({
            "uptime": 52358,
            "globalLock": {"totalTime": 52358205700u64, "lockTime": 1455600, "ratio": 0.0000278},
            "mem": {"resident": 22, "virtual": 145, "supported": true, "mapped": 80},
            "connections": {"current": 2, "available": 19998},
            "opcounters": {"insert": 3, "query": 15, "update": 0, "delete": 0, "getmore": 0},
            "ok": 1
        }));
        let status: ServerStatus = response.parse().unwrap();
        assert_eq!(status.uptime, Some(52358.0));
        assert_eq!(status.mem.unwrap().virtual_size, 145.0);
        assert_eq!(status.connections.unwrap().available, 19998);
        assert_eq!(status.opcounters.unwrap().query, 15);
    }

    #[test]
    fn parse_shard_list() {
        let response = Response::new(json!({
            "shards": [{"_id": "shard0", "host": "localhost:10000"}],
            "ok": 1
        }));
        let list: ShardList = response.parse().unwrap();
        assert_eq!(list.shards.len(), 1);
        assert_eq!(list.shards[0].host, "localhost:10000");
        assert_eq!(list.shards[0].id.as_deref(), Some("shard0"));
    }

    #[test]
    fn parse_wrong_shape() {
        let response = Response::new(json!({"databases": "nope"}));
        let err = response.parse::<DatabaseList>().unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedShape(_)));
    }

    proptest! {
        #[test]
        fn truthy_ok_always_validates(n in 1i64..i64::MAX, msg in ".*") {
            let result = validate(Some(&json!({"ok": n, "msg": msg})));
            prop_assert!(result.ok);
            prop_assert_eq!(result.message, None);
        }

        #[test]
        fn msg_always_wins(msg in ".+", errmsg in ".*") {
            let result = validate(Some(&json!({"ok": 0, "msg": msg.clone(), "errmsg": errmsg})));
            prop_assert!(!result.ok);
            prop_assert_eq!(result.message, Some(msg));
        }

        #[test]
        fn errmsg_without_msg(errmsg in ".*") {
            let result = validate(Some(&json!({"ok": false, "errmsg": errmsg.clone()})));
            prop_assert_eq!(result.message, Some(errmsg));
        }
    }
}
