//! Ordering hint envelope.
//!
//! The gateway decodes request JSON into a hash map, which loses key order.
//! Administrative commands treat the first key as the command name and the
//! rest as ordered options, so order-sensitive commands travel as an explicit
//! list of `{key, value}` records under the `$pyhint` key. The gateway
//! rebuilds an ordered document from that list.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved key that marks an ordering hint envelope.
pub const PYHINT_KEY: &str = "$pyhint";

/// A single key/value record inside an ordering hint envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedPair {
    /// Field name.
    pub key: String,
    /// Field value.
    #[serde(default)]
    pub value: Value,
}

impl OrderedPair {
    /// Creates a new pair.
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Wraps fields into an ordering hint envelope, preserving iteration order.
///
/// ```
/// use mongoose_protocol::encode_ordered;
/// use serde_json::json;
///
/// let hinted = encode_ordered([("a", json!(1)), ("b", json!(2))]);
/// assert_eq!(
///     hinted,
///     json!({"$pyhint": [{"key": "a", "value": 1}, {"key": "b", "value": 2}]})
/// );
/// ```
pub fn encode_ordered<I, K>(fields: I) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    let pairs: Vec<Value> = fields
        .into_iter()
        .map(|(key, value)| {
            let mut record = Map::with_capacity(2);
            record.insert("key".to_string(), Value::String(key.into()));
            record.insert("value".to_string(), value);
            Value::Object(record)
        })
        .collect();

    let mut envelope = Map::with_capacity(1);
    envelope.insert(PYHINT_KEY.to_string(), Value::Array(pairs));
    Value::Object(envelope)
}

/// Reconstructs the ordered fields of an ordering hint envelope.
///
/// Returns `None` if `value` is not an object holding a `$pyhint` list of
/// `{key, value}` records with string keys.
pub fn decode_ordered(value: &Value) -> Option<Vec<(String, Value)>> {
    let pairs = value.as_object()?.get(PYHINT_KEY)?;
    let pairs = Vec::<OrderedPair>::deserialize(pairs).ok()?;
    Some(pairs.into_iter().map(|p| (p.key, p.value)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn encode_preserves_order() {
        let hinted = encode_ordered([("b", json!(2)), ("a", json!(1))]);
        let pairs = hinted[PYHINT_KEY].as_array().unwrap();
        assert_eq!(pairs[0], json!({"key": "b", "value": 2}));
        assert_eq!(pairs[1], json!({"key": "a", "value": 1}));
    }

    #[test]
    fn encode_empty() {
        let hinted = encode_ordered(Vec::<(String, Value)>::new());
        assert_eq!(hinted, json!({"$pyhint": []}));
        assert_eq!(decode_ordered(&hinted), Some(vec![]));
    }

    #[test]
    fn decode_survives_text_round_trip() {
        let hinted = encode_ordered([
            ("shardcollection", json!("test.users")),
            ("key", json!({"x": 1})),
            ("unique", json!(false)),
        ]);
        let text = serde_json::to_string(&hinted).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();

        let fields = decode_ordered(&parsed).unwrap();
        let keys: Vec<&str> = fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["shardcollection", "key", "unique"]);
    }

    #[test]
    fn decode_rejects_malformed() {
        assert_eq!(decode_ordered(&json!({"addshard": "a:1"})), None);
        assert_eq!(decode_ordered(&json!({"$pyhint": "nope"})), None);
        assert_eq!(decode_ordered(&json!({"$pyhint": [{"value": 1}]})), None);
        assert_eq!(decode_ordered(&json!({"$pyhint": [{"key": 3, "value": 1}]})), None);
        assert_eq!(decode_ordered(&json!([1, 2])), None);
    }

    #[test]
    fn missing_value_is_null() {
        let fields = decode_ordered(&json!({"$pyhint": [{"key": "a"}]})).unwrap();
        assert_eq!(fields, vec![("a".to_string(), Value::Null)]);
    }

    proptest! {
        #[test]
        fn ordering_survives_serialization(keys in proptest::collection::vec("[a-z]{1,8}", 0..12)) {
            let fields: Vec<(String, Value)> = keys
                .iter()
                .enumerate()
                .map(|(i, k)| (k.clone(), json!(i)))
                .collect();

            let text = serde_json::to_string(&encode_ordered(fields.clone())).unwrap();
            let parsed: Value = serde_json::from_str(&text).unwrap();
            prop_assert_eq!(decode_ordered(&parsed), Some(fields));
        }
    }
}
