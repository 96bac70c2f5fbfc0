//! Integration tests for the client against the in-memory gateway.

use mongoose_client::{
    on_complete, ChunkCriteria, ClientConfig, ClientError, CommandEncoding, Connection,
    ConnectReply, CursorBatch, DatabaseList, FindOptions, HostPort, HttpResponse, HttpTransport,
    LoopbackClient, LoopbackServer, Method, Params, ServerStatus, ShardList, SortOrder,
    UpdateOptions,
};
use mongoose_testkit::{
    numbered_documents, sharded_cluster, two_shard_gateway, FakeGateway, GatewayReply, KeyOrder,
    FIXTURE_MONGOS, FIXTURE_SHARDS, LOCALHOST_SHARD_ERROR,
};
use serde_json::json;
use std::sync::Arc;

/// A loopback server that forwards to an in-memory gateway.
struct InMemoryGateway {
    gateway: Arc<FakeGateway>,
}

impl LoopbackServer for InMemoryGateway {
    fn handle(&self, method: Method, path: &str, params: &Params) -> HttpResponse {
        let reply = self.gateway.handle(method, path, params);
        HttpResponse {
            status: reply.status,
            body: reply.body,
        }
    }
}

type TestConnection = Connection<HttpTransport<LoopbackClient<InMemoryGateway>>>;

fn connect(gateway: &Arc<FakeGateway>, config: ClientConfig) -> TestConnection {
    let server = InMemoryGateway {
        gateway: Arc::clone(gateway),
    };
    let transport = HttpTransport::new(config.gateway_url.clone(), LoopbackClient::new(server));
    Connection::new(config, transport)
}

fn default_config() -> ClientConfig {
    ClientConfig::new(FIXTURE_MONGOS.parse().unwrap())
}

#[tokio::test]
async fn full_sharding_workflow() {
    let gateway = Arc::new(FakeGateway::new());
    let conn = connect(&gateway, default_config());

    conn.set_mongos().await.unwrap();
    assert_eq!(gateway.mongos().as_deref(), Some(FIXTURE_MONGOS));

    for shard in FIXTURE_SHARDS {
        let added = conn.shard(shard).add(None).await.unwrap();
        assert_eq!(added.get("added"), Some(&json!(shard)));
    }

    let shards: ShardList = conn.get_shards().await.unwrap().parse().unwrap();
    let hosts: Vec<_> = shards.shards.iter().map(|s| s.host.as_str()).collect();
    assert_eq!(hosts, FIXTURE_SHARDS.to_vec());

    let db = conn.database("test");
    db.shard().await.unwrap();
    db.move_primary(FIXTURE_SHARDS[1]).await.unwrap();
    assert_eq!(gateway.primary_of("test").as_deref(), Some(FIXTURE_SHARDS[1]));

    let users = db.collection("users");
    users.shard(json!({"x": 1}), None).await.unwrap();
    users.split(&ChunkCriteria::middle(json!({"x": 50}))).await.unwrap();
    users.split(&ChunkCriteria::find(json!({"x": 10}))).await.unwrap();
    users
        .move_chunk(&ChunkCriteria::find(json!({"x": 10})), FIXTURE_SHARDS[0])
        .await
        .unwrap();
    assert_eq!(gateway.chunk_count("test.users"), Some(3));

    let version = users.version().await.unwrap();
    assert_eq!(version.get("version"), Some(&json!(4)));
}

#[tokio::test]
async fn ordering_hint_survives_unordered_gateway() {
    let gateway = Arc::new(two_shard_gateway().with_key_order(KeyOrder::Sorted));
    let conn = connect(&gateway, default_config());

    conn.database("test").shard().await.unwrap();
    conn.collection("test", "users")
        .shard(json!({"x": 1}), Some(true))
        .await
        .unwrap();
    conn.collection("test", "users")
        .move_chunk(&ChunkCriteria::find(json!({"x": 1})), FIXTURE_SHARDS[1])
        .await
        .unwrap();

    let received = gateway.received_commands();
    assert_eq!(received[1].keys(), vec!["shardcollection", "key", "unique"]);
    assert!(received[1].hinted);
    assert_eq!(received[2].keys(), vec!["movechunk", "find", "to"]);
    assert!(received[2].hinted);
}

#[tokio::test]
async fn plain_encoding_breaks_on_unordered_gateway() {
    let gateway = Arc::new(sharded_cluster().with_key_order(KeyOrder::Sorted));
    let conn = connect(
        &gateway,
        default_config().with_encoding(CommandEncoding::Plain),
    );

    let err = conn
        .collection("test", "users")
        .split(&ChunkCriteria::find(json!({"x": 1})))
        .await
        .unwrap_err();
    assert_eq!(err.remote_message(), Some("no such cmd"));
    assert_eq!(gateway.received_commands().last().unwrap().name(), Some("find"));
}

#[tokio::test]
async fn localhost_shard_needs_allow_local() {
    let gateway = Arc::new(FakeGateway::new());
    let conn = connect(&gateway, default_config());

    let err = conn.shard("localhost:10000").add(None).await.unwrap_err();
    assert_eq!(err.remote_message(), Some(LOCALHOST_SHARD_ERROR));
    assert!(gateway.shards().is_empty());

    conn.shard("localhost:10000").add(Some(true)).await.unwrap();
    assert_eq!(gateway.shards(), vec!["localhost:10000".to_string()]);
}

#[tokio::test]
async fn invalid_arguments_never_reach_gateway() {
    let gateway = Arc::new(sharded_cluster());
    let before = gateway.request_count();
    let conn = connect(&gateway, default_config());
    let users = conn.collection("test", "users");

    assert!(users.split(&ChunkCriteria::default()).await.is_err());
    assert!(users
        .move_chunk(&ChunkCriteria::middle(json!({"x": 1})), FIXTURE_SHARDS[1])
        .await
        .is_err());
    assert!(users.shard(json!({}), None).await.is_err());
    assert!(users.insert(&[], false).await.is_err());
    assert!(matches!(
        conn.shard(FIXTURE_SHARDS[0]).remove().await,
        Err(ClientError::NotImplemented(_))
    ));

    assert_eq!(gateway.request_count(), before);
}

#[tokio::test]
async fn transport_failures_reach_caller() {
    let gateway = Arc::new(FakeGateway::new());
    let conn = connect(&gateway, default_config());

    gateway.push_reply(GatewayReply::raw(500, "boom"));
    let err = conn.hello().await.unwrap_err();
    assert!(matches!(err, ClientError::TransportFailure { status: Some(500), .. }));

    gateway.push_reply(GatewayReply::raw(200, "<html></html>"));
    let err = conn.hello().await.unwrap_err();
    assert!(matches!(err, ClientError::TransportFailure { status: None, .. }));

    gateway.push_reply(GatewayReply::raw(200, "null"));
    let err = conn.hello().await.unwrap_err();
    assert_eq!(err.remote_message(), Some(mongoose_protocol::FALLBACK_MESSAGE));

    assert!(conn.requester().last_error().is_some());
    conn.hello().await.unwrap();
    assert!(conn.requester().last_error().is_none());
}

#[tokio::test]
async fn unknown_path_is_transport_failure() {
    let gateway = Arc::new(FakeGateway::new());
    let conn = connect(&gateway, default_config());

    let err = conn.get("/_nope", Vec::new()).await.unwrap_err();
    assert!(matches!(err, ClientError::TransportFailure { status: Some(404), .. }));
    assert!(err.to_string().contains("Script Not Found"));
}

#[tokio::test]
async fn shard_status_and_databases() {
    let gateway = Arc::new(sharded_cluster());
    let conn = connect(&gateway, default_config());
    let shard = conn.shard(FIXTURE_SHARDS[0]);

    let status: ServerStatus = shard.status().await.unwrap().parse().unwrap();
    assert!(status.uptime.is_some());
    assert!(status.global_lock.is_some());
    assert!(status.mem.unwrap().supported);

    let dbs: DatabaseList = shard.databases().await.unwrap().parse().unwrap();
    let names: Vec<_> = dbs.databases.iter().map(|d| d.name.as_str()).collect();
    assert!(names.contains(&"admin"));
    assert!(names.contains(&"test"));

    let err = conn.shard("unknown:1").status().await.unwrap_err();
    assert_eq!(err.remote_message(), Some("couldn't connect to server unknown:1"));
}

#[tokio::test]
async fn connect_and_config() {
    let gateway = Arc::new(FakeGateway::new().with_config_server("cfg.example:27019"));
    let conn = connect(&gateway, default_config());

    let reply: ConnectReply = conn.connect(Some("admin-conn")).await.unwrap().parse().unwrap();
    assert_eq!(reply.server.as_deref(), Some(FIXTURE_MONGOS));
    assert_eq!(reply.name.as_deref(), Some("admin-conn"));

    let config = conn.get_config().await.unwrap();
    assert_eq!(config.get("configserver"), Some(&json!("cfg.example:27019")));
}

#[tokio::test]
async fn authenticate_against_database() {
    let gateway = Arc::new(FakeGateway::new().with_user("test", "admin", "secret"));
    let conn = connect(&gateway, default_config());
    let db = conn.database("test");

    db.authenticate("admin", "secret").await.unwrap();
    let err = db.authenticate("admin", "wrong").await.unwrap_err();
    assert_eq!(err.remote_message(), Some("authentication failed"));
}

#[tokio::test]
async fn insert_without_ok_is_remote_failure() {
    let gateway = Arc::new(FakeGateway::new().with_bare_insert_reply());
    let conn = connect(&gateway, default_config());
    let users = conn.collection("test", "users");

    let err = users.insert(&numbered_documents(2), true).await.unwrap_err();
    assert!(matches!(err, ClientError::RemoteFailure { message: None }));
    assert_eq!(gateway.documents("test.users").len(), 2);
}

#[tokio::test]
async fn documents_round_trip_through_cursor() {
    let gateway = Arc::new(FakeGateway::new());
    let conn = connect(&gateway, default_config());
    let users = conn.collection("test", "users");

    let inserted = users.insert(&numbered_documents(5), true).await.unwrap();
    assert_eq!(inserted.get("oids").unwrap().as_array().unwrap().len(), 5);

    let first: CursorBatch = users
        .find(
            &FindOptions::new()
                .sort_by("x", SortOrder::Descending)
                .with_batch_size(2),
        )
        .await
        .unwrap()
        .parse()
        .unwrap();
    let xs: Vec<_> = first.results.iter().map(|d| d["x"].clone()).collect();
    assert_eq!(xs, vec![json!(4), json!(3)]);

    let rest: CursorBatch = users
        .more(first.id.unwrap(), Some(10))
        .await
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(rest.results.len(), 3);

    let options = UpdateOptions {
        multi: true,
        safe: true,
        ..UpdateOptions::default()
    };
    let updated = users
        .update(&json!({"x": 1}), &json!({"$set": {"tag": "one"}}), &options)
        .await
        .unwrap();
    assert_eq!(updated.get("n"), Some(&json!(1)));

    users.remove(Some(&json!({"x": 0})), false).await.unwrap();
    assert_eq!(gateway.documents("test.users").len(), 4);

    let err = users.more(999, None).await.unwrap_err();
    assert_eq!(err.remote_message(), Some("couldn't find the cursor with id 999"));
}

#[tokio::test]
async fn command_param_is_configurable() {
    let gateway = Arc::new(FakeGateway::new().with_command_param("cmd"));
    let conn = connect(&gateway, default_config().with_command_param("cmd"));
    conn.get_shards().await.unwrap();

    let conn = connect(&gateway, default_config());
    let err = conn.get_shards().await.unwrap_err();
    assert_eq!(err.remote_message(), Some("missing cmd"));
}

#[tokio::test]
async fn retarget_changes_mongos() {
    let gateway = Arc::new(FakeGateway::new());
    let mut conn = connect(&gateway, default_config());

    conn.retarget(HostPort::new("other.example", 27020));
    conn.set_mongos().await.unwrap();
    assert_eq!(gateway.mongos().as_deref(), Some("other.example:27020"));
}

#[tokio::test]
async fn callback_receives_remote_failure() {
    let gateway = Arc::new(FakeGateway::new());
    let conn = Arc::new(connect(&gateway, default_config()));
    let (tx, rx) = tokio::sync::oneshot::channel();

    let task = {
        let conn = Arc::clone(&conn);
        on_complete(
            async move { conn.database("test").move_primary(FIXTURE_SHARDS[0]).await },
            move |result| {
                let _ = tx.send(result);
            },
        )
    };
    task.await.unwrap();

    let err = rx.await.unwrap().unwrap_err();
    assert_eq!(err.remote_message(), Some("that server isn't known to me"));
}
