//! Cluster fixtures.

use crate::gateway::FakeGateway;
use serde_json::{json, Value};

/// Shard addresses used by [`sharded_cluster`].
pub const FIXTURE_SHARDS: [&str; 2] = ["shard1.example:27018", "shard2.example:27018"];

/// Mongos address used by the fixtures.
pub const FIXTURE_MONGOS: &str = "mongos.example:27017";

/// A gateway with two registered shards and no sharded databases.
pub fn two_shard_gateway() -> FakeGateway {
    FIXTURE_SHARDS
        .iter()
        .fold(FakeGateway::new(), |gateway, shard| gateway.with_shard(*shard))
}

/// A gateway with two shards, `test` sharding-enabled and `test.users`
/// sharded on `{x: 1}`.
pub fn sharded_cluster() -> FakeGateway {
    use mongoose_protocol::Method;

    let gateway = two_shard_gateway();
    for command in [
        json!({"enablesharding": "test"}),
        json!({"shardcollection": "test.users", "key": {"x": 1}}),
    ] {
        let params = vec![("obj".to_string(), command.to_string())];
        gateway.handle(Method::Post, "/admin/_cmd", &params);
    }
    gateway
}

/// `n` documents `{x: 0}` .. `{x: n-1}`.
pub fn numbered_documents(n: usize) -> Vec<Value> {
    (0..n).map(|i| json!({"x": i})).collect()
}
