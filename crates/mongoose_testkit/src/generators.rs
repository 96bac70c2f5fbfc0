//! Property-based test generators using proptest.
//!
//! Provides strategies for commands, field lists and gateway replies.

use mongoose_protocol::Command;
use proptest::prelude::*;
use serde_json::{json, Value};

/// Strategy for generating field and collection names.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating `host:port` addresses.
pub fn host_port_strategy() -> impl Strategy<Value = String> {
    (
        prop::string::string_regex("[a-z][a-z0-9]{0,11}(\\.[a-z]{2,6})?").expect("Invalid regex"),
        1024u16..,
    )
        .prop_map(|(host, port)| format!("{host}:{port}"))
}

/// Strategy for generating scalar JSON values.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,16}".prop_map(Value::from),
    ]
}

/// Strategy for generating small JSON documents.
pub fn document_strategy() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(field_name_strategy(), scalar_strategy(), 0..6)
        .prop_map(|fields| Value::Object(fields.into_iter().collect()))
}

/// Strategy for generating field lists with unique keys in arbitrary order.
pub fn ordered_fields_strategy() -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::vec((field_name_strategy(), scalar_strategy()), 1..8).prop_map(|pairs| {
        let mut fields: Vec<(String, Value)> = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            if !fields.iter().any(|(k, _)| *k == key) {
                fields.push((key, value));
            }
        }
        fields
    })
}

/// Strategy for generating order-sensitive commands.
pub fn command_strategy() -> impl Strategy<Value = Command> {
    ordered_fields_strategy().prop_map(|fields| {
        let mut iter = fields.into_iter();
        match iter.next() {
            Some((name, value)) => {
                iter.fold(Command::ordered(name, value), |cmd, (k, v)| cmd.field(k, v))
            }
            None => Command::default(),
        }
    })
}

/// Strategy for generating shard keys: non-empty objects of `1` / `-1`.
pub fn shard_key_strategy() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(field_name_strategy(), prop_oneof![Just(1), Just(-1)], 1..4)
        .prop_map(|fields| {
            Value::Object(fields.into_iter().map(|(k, v)| (k, json!(v))).collect())
        })
}

/// Strategy for generating `ok` values together with their truthiness.
pub fn ok_value_strategy() -> impl Strategy<Value = (Value, bool)> {
    prop_oneof![
        Just((json!(1), true)),
        Just((json!(1.0), true)),
        Just((json!(true), true)),
        Just((json!("yes"), true)),
        Just((json!({}), true)),
        Just((json!([]), true)),
        Just((json!(0), false)),
        Just((json!(0.0), false)),
        Just((json!(false), false)),
        Just((json!(""), false)),
        Just((Value::Null, false)),
    ]
}

/// Strategy for generating gateway replies with the expected validation
/// outcome.
///
/// Replies may carry `msg`, `errmsg`, both, or neither; an absent `ok`
/// counts as failure.
pub fn reply_strategy() -> impl Strategy<Value = (Value, bool)> {
    (
        prop::option::of(ok_value_strategy()),
        prop::option::of("[ -~]{1,24}"),
        prop::option::of("[ -~]{1,24}"),
        document_strategy(),
    )
        .prop_map(|(ok, msg, errmsg, extra)| {
            let mut reply = match extra {
                Value::Object(map) => map,
                _ => serde_json::Map::new(),
            };
            reply.remove("ok");
            reply.remove("msg");
            reply.remove("errmsg");
            let expected = match ok {
                Some((value, truthy)) => {
                    reply.insert("ok".to_string(), value);
                    truthy
                }
                None => false,
            };
            if let Some(msg) = msg {
                reply.insert("msg".to_string(), Value::from(msg));
            }
            if let Some(errmsg) = errmsg {
                reply.insert("errmsg".to_string(), Value::from(errmsg));
            }
            (Value::Object(reply), expected)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongoose_protocol::{decode_ordered, validate, CommandEncoding};

    proptest! {
        #[test]
        fn generated_fields_have_unique_keys(fields in ordered_fields_strategy()) {
            let mut keys: Vec<_> = fields.iter().map(|(k, _)| k.clone()).collect();
            keys.sort();
            keys.dedup();
            prop_assert_eq!(keys.len(), fields.len());
        }

        #[test]
        fn hinted_commands_decode_in_order(cmd in command_strategy()) {
            let text = cmd.encode(CommandEncoding::OrderingHint).unwrap();
            let wire: Value = serde_json::from_str(&text).unwrap();
            prop_assert_eq!(decode_ordered(&wire).unwrap(), cmd.fields().to_vec());
        }

        #[test]
        fn reply_expectation_matches_validator((reply, ok) in reply_strategy()) {
            prop_assert_eq!(validate(Some(&reply)).ok, ok);
        }

        #[test]
        fn shard_keys_are_non_empty(key in shard_key_strategy()) {
            prop_assert!(!key.as_object().unwrap().is_empty());
        }
    }
}
