//! Administrative commands.

use crate::error::{ProtocolError, ProtocolResult};
use crate::hint::encode_ordered;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// How a command is encoded into the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandEncoding {
    /// Send the command as a JSON object with keys in insertion order.
    Plain,
    /// Wrap order-sensitive commands in a `$pyhint` envelope.
    #[default]
    OrderingHint,
}

/// A database command: an ordered list of fields.
///
/// The first field names the command; the remaining fields are its options.
/// Field order is part of the command's meaning, so it is kept exactly as
/// built, through serialization and (with [`CommandEncoding::OrderingHint`])
/// through gateways that decode JSON into unordered maps.
///
/// # Example
///
/// ```
/// use mongoose_protocol::Command;
/// use serde_json::json;
///
/// let cmd = Command::ordered("moveprimary", json!("test")).field("to", json!("shard1:27018"));
/// assert_eq!(cmd.name(), Some("moveprimary"));
/// assert_eq!(
///     serde_json::to_string(&cmd).unwrap(),
///     r#"{"moveprimary":"test","to":"shard1:27018"}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Command {
    fields: Vec<(String, Value)>,
    order_sensitive: bool,
}

impl Command {
    /// Creates a command whose first field is `name: value`.
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            fields: vec![(name.into(), value)],
            order_sensitive: false,
        }
    }

    /// Creates an order-sensitive command whose first field is `name: value`.
    pub fn ordered(name: impl Into<String>, value: Value) -> Self {
        Self {
            fields: vec![(name.into(), value)],
            order_sensitive: true,
        }
    }

    /// Appends a field. Re-using a key replaces its value in place.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
        self
    }

    /// Marks the command as order-sensitive.
    #[must_use]
    pub fn order_sensitive(mut self) -> Self {
        self.order_sensitive = true;
        self
    }

    /// Returns true if the receiving side depends on field order.
    pub fn is_order_sensitive(&self) -> bool {
        self.order_sensitive
    }

    /// Returns the command name (the first key).
    pub fn name(&self) -> Option<&str> {
        self.fields.first().map(|(k, _)| k.as_str())
    }

    /// Returns the value of a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns all fields in order.
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Returns the field names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the command has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Converts the command into its wire value.
    pub fn to_wire(&self, encoding: CommandEncoding) -> Value {
        match encoding {
            CommandEncoding::OrderingHint if self.order_sensitive => {
                encode_ordered(self.fields.iter().map(|(k, v)| (k.clone(), v.clone())))
            }
            _ => Value::Object(self.fields.iter().cloned().collect()),
        }
    }

    /// Encodes the command as JSON text for the request body.
    pub fn encode(&self, encoding: CommandEncoding) -> ProtocolResult<String> {
        match encoding {
            CommandEncoding::OrderingHint if self.order_sensitive => {
                serde_json::to_string(&self.to_wire(encoding)).map_err(ProtocolError::Encode)
            }
            _ => serde_json::to_string(self).map_err(ProtocolError::Encode),
        }
    }

    // Admin command catalog

    /// `{netstat: 1}`: reports the config server.
    pub fn netstat() -> Self {
        Self::new("netstat", Value::from(1))
    }

    /// `{listshards: 1}`: lists the shards in the cluster.
    pub fn listshards() -> Self {
        Self::new("listshards", Value::from(1))
    }

    /// `{addshard, allowLocal}`: registers a shard server.
    pub fn addshard(server: &str, allow_local: bool) -> Self {
        Self::ordered("addshard", Value::from(server))
            .field("allowLocal", Value::Bool(allow_local))
    }

    /// `{enablesharding}`: enables sharding on a database.
    pub fn enablesharding(db: &str) -> Self {
        Self::new("enablesharding", Value::from(db))
    }

    /// `{moveprimary, to}`: moves a database's primary shard.
    pub fn moveprimary(db: &str, to: &str) -> Self {
        Self::ordered("moveprimary", Value::from(db)).field("to", Value::from(to))
    }

    /// `{shardcollection, key, unique}`: shards a collection on `key`.
    pub fn shardcollection(ns: &str, key: Value, unique: bool) -> Self {
        Self::ordered("shardcollection", Value::from(ns))
            .field("key", key)
            .field("unique", Value::Bool(unique))
    }

    /// `{shard, find|middle}`: splits a chunk.
    ///
    /// Fails with [`ProtocolError::MissingField`] if the criteria hold
    /// neither `find` nor `middle`.
    pub fn split(ns: &str, criteria: &ChunkCriteria) -> ProtocolResult<Self> {
        let (key, value) = criteria.split_point().ok_or_else(|| {
            ProtocolError::MissingField("no find or middle object given".into())
        })?;
        Ok(Self::ordered("shard", Value::from(ns)).field(key, value.clone()))
    }

    /// `{movechunk, find, to}`: moves the chunk matching `criteria.find`.
    ///
    /// Fails with [`ProtocolError::MissingField`] if `find` is absent.
    pub fn movechunk(ns: &str, criteria: &ChunkCriteria, to: &str) -> ProtocolResult<Self> {
        let find = criteria
            .find_value()
            .ok_or_else(|| ProtocolError::MissingField("no find object given".into()))?;
        Ok(Self::ordered("movechunk", Value::from(ns))
            .field("find", find.clone())
            .field("to", Value::from(to)))
    }

    /// `{getShardVersion}`: reports a collection's shard version.
    pub fn get_shard_version(ns: &str) -> Self {
        Self::new("getShardVersion", Value::from(ns))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(text) => f.write_str(&text),
            Err(_) => f.write_str("<unencodable command>"),
        }
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CommandVisitor;

        impl<'de> Visitor<'de> for CommandVisitor {
            type Value = Command;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a command object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Command, A::Error> {
                let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, Value>()? {
                    fields.push((key, value));
                }
                Ok(Command {
                    fields,
                    order_sensitive: false,
                })
            }
        }

        deserializer.deserialize_map(CommandVisitor)
    }
}

/// Criteria selecting a chunk for split and move operations.
///
/// JSON `null` counts as absent. When both fields are set, `find` is used.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChunkCriteria {
    /// A query matching at least one document in the chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub find: Option<Value>,
    /// The exact shard key value to split at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle: Option<Value>,
}

impl ChunkCriteria {
    /// Criteria selecting the chunk that contains documents matching `query`.
    pub fn find(query: Value) -> Self {
        Self {
            find: Some(query),
            middle: None,
        }
    }

    /// Criteria splitting at the exact shard key value `key`.
    pub fn middle(key: Value) -> Self {
        Self {
            find: None,
            middle: Some(key),
        }
    }

    fn find_value(&self) -> Option<&Value> {
        self.find.as_ref().filter(|v| !v.is_null())
    }

    fn middle_value(&self) -> Option<&Value> {
        self.middle.as_ref().filter(|v| !v.is_null())
    }

    /// Returns the field used to pick the split point, `find` first.
    pub fn split_point(&self) -> Option<(&'static str, &Value)> {
        self.find_value()
            .map(|v| ("find", v))
            .or_else(|| self.middle_value().map(|v| ("middle", v)))
    }
}
