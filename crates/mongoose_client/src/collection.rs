//! Collection handles: sharding commands and document passthrough.

use crate::connection::{json_param, Connection};
use crate::error::{ClientError, ClientResult};
use crate::transport::Requester;
use mongoose_protocol::{
    ChunkCriteria, CollectionAction, Command, Endpoint, Params, Response,
};
use serde_json::Value;

/// Sort direction for a find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

impl SortOrder {
    fn as_i32(self) -> i32 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }
}

/// Options for [`Collection::find`].
///
/// Unset options are not sent; the gateway then applies its own defaults
/// (no limit, no skip, batches of 15).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Query document.
    pub criteria: Option<Value>,
    /// Projection document.
    pub fields: Option<Value>,
    /// Sort keys, applied in order.
    pub sort: Vec<(String, SortOrder)>,
    /// Maximum number of documents.
    pub limit: Option<u32>,
    /// Number of documents to skip.
    pub skip: Option<u32>,
    /// Documents per batch.
    pub batch_size: Option<u32>,
    /// Return the query plan instead of documents.
    pub explain: bool,
}

impl FindOptions {
    /// Creates empty options: every document, gateway defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the query document.
    #[must_use]
    pub fn with_criteria(mut self, criteria: Value) -> Self {
        self.criteria = Some(criteria);
        self
    }

    /// Sets the projection document.
    #[must_use]
    pub fn with_fields(mut self, fields: Value) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Appends a sort key.
    #[must_use]
    pub fn sort_by(mut self, key: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((key.into(), order));
        self
    }

    /// Sets the document limit.
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the number of documents to skip.
    #[must_use]
    pub fn with_skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Sets the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Requests the query plan.
    #[must_use]
    pub fn explain(mut self) -> Self {
        self.explain = true;
        self
    }

    fn sort_command(&self) -> Option<Command> {
        if self.sort.is_empty() {
            return None;
        }
        let sort = self
            .sort
            .iter()
            .fold(Command::default(), |cmd, (key, order)| {
                cmd.field(key.as_str(), Value::from(order.as_i32()))
            });
        Some(if sort.len() > 1 { sort.order_sensitive() } else { sort })
    }
}

/// Options for [`Collection::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Insert `newobj` if nothing matches.
    pub upsert: bool,
    /// Update every match instead of the first.
    pub multi: bool,
    /// Wait for the server's last-error status.
    pub safe: bool,
}

// The gateway treats any non-empty flag value as true, so false flags are
// omitted rather than sent.
fn push_flag(params: &mut Params, key: &str, set: bool) {
    if set {
        params.push((key.to_string(), "1".to_string()));
    }
}

/// A collection in the cluster, addressed by its namespace `db.name`.
pub struct Collection<'a, R: Requester> {
    connection: &'a Connection<R>,
    db: String,
    name: String,
    ns: String,
}

impl<'a, R: Requester> Collection<'a, R> {
    pub(crate) fn new(connection: &'a Connection<R>, db: &str, name: &str) -> Self {
        Self {
            connection,
            db: db.to_string(),
            name: name.to_string(),
            ns: format!("{db}.{name}"),
        }
    }

    /// Returns the database name.
    pub fn database_name(&self) -> &str {
        &self.db
    }

    /// Returns the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the namespace, `db.name`.
    pub fn namespace(&self) -> &str {
        &self.ns
    }

    fn endpoint(&self, action: CollectionAction) -> ClientResult<Endpoint> {
        if self.db.is_empty() || self.name.is_empty() {
            return Err(ClientError::invalid_argument(
                "db and collection must be defined",
            ));
        }
        Ok(Endpoint::collection(&self.db, &self.name, action))
    }

    /// Shards this collection on `key`.
    ///
    /// `key` must be a non-empty object such as `{"x": 1}`. `unique`
    /// defaults to `false`.
    pub async fn shard(&self, key: Value, unique: Option<bool>) -> ClientResult<Response> {
        if !key.as_object().is_some_and(|fields| !fields.is_empty()) {
            return Err(ClientError::invalid_argument("shard key must be a non-empty object"));
        }
        let command = Command::shardcollection(&self.ns, key, unique.unwrap_or(false));
        self.connection.admin_command(&command).await
    }

    /// Splits a chunk.
    ///
    /// With `find`, the chunk holding the first matching document is split
    /// at its median; with `middle`, the chunk is split at that exact key.
    /// `find` wins when both are given.
    pub async fn split(&self, criteria: &ChunkCriteria) -> ClientResult<Response> {
        let command = Command::split(&self.ns, criteria)?;
        self.connection.admin_command(&command).await
    }

    /// Moves the chunk holding the first document matching `criteria.find`
    /// to the shard at `to`.
    pub async fn move_chunk(&self, criteria: &ChunkCriteria, to: &str) -> ClientResult<Response> {
        if to.is_empty() {
            return Err(ClientError::invalid_argument("target shard required"));
        }
        let command = Command::movechunk(&self.ns, criteria, to)?;
        self.connection.admin_command(&command).await
    }

    /// Gets this collection's shard version.
    pub async fn version(&self) -> ClientResult<Response> {
        self.connection
            .admin_command(&Command::get_shard_version(&self.ns))
            .await
    }

    /// Queries documents. The reply carries the first batch and a cursor
    /// `id` for [`Collection::more`] (see [`mongoose_protocol::CursorBatch`]).
    pub async fn find(&self, options: &FindOptions) -> ClientResult<Response> {
        let endpoint = self.endpoint(CollectionAction::Find)?;
        let mut params = Params::new();
        if let Some(criteria) = &options.criteria {
            params.push(json_param("criteria", criteria)?);
        }
        if let Some(fields) = &options.fields {
            params.push(json_param("fields", fields)?);
        }
        if let Some(sort) = options.sort_command() {
            params.push(("sort".to_string(), sort.encode(self.connection.config().encoding)?));
        }
        if let Some(limit) = options.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(skip) = options.skip {
            params.push(("skip".to_string(), skip.to_string()));
        }
        if let Some(batch_size) = options.batch_size {
            params.push(("batch_size".to_string(), batch_size.to_string()));
        }
        push_flag(&mut params, "explain", options.explain);
        self.connection.call(&endpoint, params).await
    }

    /// Fetches the next batch of cursor `cursor_id`.
    pub async fn more(&self, cursor_id: i64, batch_size: Option<u32>) -> ClientResult<Response> {
        let endpoint = self.endpoint(CollectionAction::More)?;
        let mut params = vec![("id".to_string(), cursor_id.to_string())];
        if let Some(batch_size) = batch_size {
            params.push(("batch_size".to_string(), batch_size.to_string()));
        }
        self.connection.call(&endpoint, params).await
    }

    /// Inserts `docs`.
    pub async fn insert(&self, docs: &[Value], safe: bool) -> ClientResult<Response> {
        let endpoint = self.endpoint(CollectionAction::Insert)?;
        if docs.is_empty() {
            return Err(ClientError::invalid_argument("missing docs"));
        }
        let mut params = vec![json_param("docs", docs)?];
        push_flag(&mut params, "safe", safe);
        self.connection.call(&endpoint, params).await
    }

    /// Updates documents matching `criteria` with `newobj`.
    pub async fn update(
        &self,
        criteria: &Value,
        newobj: &Value,
        options: &UpdateOptions,
    ) -> ClientResult<Response> {
        let endpoint = self.endpoint(CollectionAction::Update)?;
        let mut params = vec![json_param("criteria", criteria)?, json_param("newobj", newobj)?];
        push_flag(&mut params, "upsert", options.upsert);
        push_flag(&mut params, "multi", options.multi);
        push_flag(&mut params, "safe", options.safe);
        self.connection.call(&endpoint, params).await
    }

    /// Removes documents matching `criteria`, or every document if `None`.
    pub async fn remove(&self, criteria: Option<&Value>, safe: bool) -> ClientResult<Response> {
        let endpoint = self.endpoint(CollectionAction::Remove)?;
        let mut params = Params::new();
        if let Some(criteria) = criteria {
            params.push(json_param("criteria", criteria)?);
        }
        push_flag(&mut params, "safe", safe);
        self.connection.call(&endpoint, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::transport::MockTransport;
    use mongoose_protocol::{decode_ordered, CommandEncoding, Method};
    use serde_json::json;

    fn connection() -> Connection<MockTransport> {
        Connection::new(ClientConfig::default(), MockTransport::new())
    }

    fn plain_connection() -> Connection<MockTransport> {
        Connection::new(
            ClientConfig::default().with_encoding(CommandEncoding::Plain),
            MockTransport::new(),
        )
    }

    #[tokio::test]
    async fn shard_collection() {
        let conn = connection();
        conn.collection("test", "users")
            .shard(json!({"x": 1}), None)
            .await
            .unwrap();

        let hinted = conn.requester().last_request().unwrap().json_param("obj").unwrap();
        assert_eq!(
            decode_ordered(&hinted).unwrap(),
            vec![
                ("shardcollection".to_string(), json!("test.users")),
                ("key".to_string(), json!({"x": 1})),
                ("unique".to_string(), json!(false)),
            ]
        );
    }

    #[tokio::test]
    async fn shard_key_must_be_object() {
        let conn = connection();
        let coll = conn.collection("test", "users");
        for key in [json!(null), json!({}), json!("x"), json!([1])] {
            let err = coll.shard(key, Some(true)).await.unwrap_err();
            assert!(matches!(err, ClientError::InvalidArgument(_)));
        }
        assert_eq!(conn.requester().call_count(), 0);
    }

    #[tokio::test]
    async fn split_with_find() {
        let conn = plain_connection();
        conn.collection("test", "users")
            .split(&ChunkCriteria::find(json!({"x": 5})))
            .await
            .unwrap();

        let request = conn.requester().last_request().unwrap();
        assert_eq!(request.path, "/admin/_cmd");
        assert_eq!(
            request.param("obj"),
            Some(r#"{"shard":"test.users","find":{"x":5}}"#)
        );
    }

    #[tokio::test]
    async fn split_prefers_find_over_middle() {
        let conn = plain_connection();
        let criteria = ChunkCriteria {
            find: Some(json!({"x": 5})),
            middle: Some(json!({"x": 7})),
        };
        conn.collection("test", "users").split(&criteria).await.unwrap();

        let body = conn.requester().last_request().unwrap().json_param("obj").unwrap();
        assert_eq!(body["find"], json!({"x": 5}));
        assert!(body.get("middle").is_none());
    }

    #[tokio::test]
    async fn split_with_middle() {
        let conn = plain_connection();
        conn.collection("test", "users")
            .split(&ChunkCriteria::middle(json!({"x": 7})))
            .await
            .unwrap();

        let request = conn.requester().last_request().unwrap();
        assert_eq!(
            request.param("obj"),
            Some(r#"{"shard":"test.users","middle":{"x":7}}"#)
        );
    }

    #[tokio::test]
    async fn split_without_criteria_sends_nothing() {
        let conn = connection();
        let err = conn
            .collection("test", "users")
            .split(&ChunkCriteria::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::InvalidArgument(ref m) if m.contains("no find or middle")
        ));
        assert_eq!(conn.requester().call_count(), 0);
    }

    #[tokio::test]
    async fn move_chunk() {
        let conn = plain_connection();
        conn.collection("test", "users")
            .move_chunk(&ChunkCriteria::find(json!({"x": 5})), "localhost:10001")
            .await
            .unwrap();

        let request = conn.requester().last_request().unwrap();
        assert_eq!(
            request.param("obj"),
            Some(r#"{"movechunk":"test.users","find":{"x":5},"to":"localhost:10001"}"#)
        );
    }

    #[tokio::test]
    async fn move_chunk_requires_find() {
        let conn = connection();
        let coll = conn.collection("test", "users");

        let err = coll
            .move_chunk(&ChunkCriteria::middle(json!({"x": 5})), "localhost:10001")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(ref m) if m.contains("no find object")));

        let err = coll
            .move_chunk(&ChunkCriteria::find(json!({"x": 5})), "")
            .await
            .unwrap_err();
        assert!(err.is_synchronous());
        assert_eq!(conn.requester().call_count(), 0);
    }

    #[tokio::test]
    async fn shard_version() {
        let conn = plain_connection();
        conn.collection("test", "users").version().await.unwrap();
        let request = conn.requester().last_request().unwrap();
        assert_eq!(request.param("obj"), Some(r#"{"getShardVersion":"test.users"}"#));
    }

    #[tokio::test]
    async fn find_sends_only_set_options() {
        let conn = connection();
        let coll = conn.collection("test", "users");
        coll.find(&FindOptions::new()).await.unwrap();

        let request = conn.requester().last_request().unwrap();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.path, "/test/users/_find");
        assert!(request.params.is_empty());

        coll.find(
            &FindOptions::new()
                .with_criteria(json!({"x": {"$gt": 1}}))
                .with_fields(json!({"x": 1}))
                .with_limit(10)
                .with_skip(5)
                .with_batch_size(2),
        )
        .await
        .unwrap();

        let request = conn.requester().last_request().unwrap();
        assert_eq!(request.json_param("criteria"), Some(json!({"x": {"$gt": 1}})));
        assert_eq!(request.json_param("fields"), Some(json!({"x": 1})));
        assert_eq!(request.param("limit"), Some("10"));
        assert_eq!(request.param("skip"), Some("5"));
        assert_eq!(request.param("batch_size"), Some("2"));
        assert_eq!(request.param("explain"), None);
    }

    #[tokio::test]
    async fn find_sort_keeps_key_order() {
        let conn = connection();
        let coll = conn.collection("test", "users");

        coll.find(&FindOptions::new().sort_by("x", SortOrder::Descending))
            .await
            .unwrap();
        let request = conn.requester().last_request().unwrap();
        assert_eq!(request.param("sort"), Some(r#"{"x":-1}"#));

        coll.find(
            &FindOptions::new()
                .sort_by("y", SortOrder::Ascending)
                .sort_by("x", SortOrder::Descending)
                .explain(),
        )
        .await
        .unwrap();
        let request = conn.requester().last_request().unwrap();
        assert_eq!(
            decode_ordered(&request.json_param("sort").unwrap()).unwrap(),
            vec![("y".to_string(), json!(1)), ("x".to_string(), json!(-1))]
        );
        assert_eq!(request.param("explain"), Some("1"));
    }

    #[tokio::test]
    async fn more_uses_cursor_id() {
        let conn = connection();
        conn.collection("test", "users").more(42, Some(3)).await.unwrap();

        let request = conn.requester().last_request().unwrap();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.path, "/test/users/_more");
        assert_eq!(request.param("id"), Some("42"));
        assert_eq!(request.param("batch_size"), Some("3"));
    }

    #[tokio::test]
    async fn insert() {
        let conn = connection();
        let coll = conn.collection("test", "users");
        coll.insert(&[json!({"x": 1}), json!({"x": 2})], true).await.unwrap();

        let request = conn.requester().last_request().unwrap();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.path, "/test/users/_insert");
        assert_eq!(request.json_param("docs"), Some(json!([{"x": 1}, {"x": 2}])));
        assert_eq!(request.param("safe"), Some("1"));

        let err = coll.insert(&[], false).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(ref m) if m == "missing docs"));
        assert_eq!(conn.requester().call_count(), 1);
    }

    #[tokio::test]
    async fn update_flags() {
        let conn = connection();
        let options = UpdateOptions {
            upsert: true,
            multi: false,
            safe: true,
        };
        conn.collection("test", "users")
            .update(&json!({"x": 1}), &json!({"$set": {"y": 2}}), &options)
            .await
            .unwrap();

        let request = conn.requester().last_request().unwrap();
        assert_eq!(request.path, "/test/users/_update");
        assert_eq!(request.json_param("criteria"), Some(json!({"x": 1})));
        assert_eq!(request.json_param("newobj"), Some(json!({"$set": {"y": 2}})));
        assert_eq!(request.param("upsert"), Some("1"));
        assert_eq!(request.param("multi"), None);
        assert_eq!(request.param("safe"), Some("1"));
    }

    #[tokio::test]
    async fn remove_all() {
        let conn = connection();
        conn.collection("test", "users").remove(None, false).await.unwrap();

        let request = conn.requester().last_request().unwrap();
        assert_eq!(request.path, "/test/users/_remove");
        assert!(request.params.is_empty());
    }

    #[tokio::test]
    async fn passthrough_needs_names() {
        let conn = connection();
        let err = conn.collection("", "users").find(&FindOptions::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));
        assert_eq!(conn.requester().call_count(), 0);
    }
}
