//! CLI command implementations.

use clap::Subcommand;
use mongoose_client::{
    ChunkCriteria, ClientError, ClientResult, Command, Connection, FindOptions, HostPort,
    Requester, Response, SortOrder, UpdateOptions,
};
use serde_json::{json, Value};
use tracing::info;

fn parse_json(s: &str) -> Result<Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {e}"))
}

// Parsed straight from the text so the command keeps its key order.
fn parse_command(s: &str) -> Result<Command, String> {
    let command: Command =
        serde_json::from_str(s).map_err(|e| format!("command must be a JSON object: {e}"))?;
    if command.is_empty() {
        return Err("command must name a command".to_string());
    }
    Ok(command)
}

/// Parses `key`, `key:asc`, `key:desc`, `key:1` or `key:-1`.
fn parse_sort(s: &str) -> Result<(String, SortOrder), String> {
    let (key, order) = match s.rsplit_once(':') {
        Some((key, order)) => (key, order),
        None => (s, "1"),
    };
    if key.is_empty() {
        return Err(format!("missing sort key in {s:?}"));
    }
    let order = match order {
        "1" | "asc" => SortOrder::Ascending,
        "-1" | "desc" => SortOrder::Descending,
        other => return Err(format!("unknown sort order {other:?}")),
    };
    Ok((key.to_string(), order))
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that the gateway is up
    Hello,

    /// Open a gateway connection to the mongos
    Connect {
        /// Register the connection under this name
        #[arg(long = "as")]
        alias: Option<String>,
    },

    /// Tell the gateway which mongos to use
    SetMongos,

    /// Show the config server
    Config,

    /// List the shards in the cluster
    Shards,

    /// Add a shard to the cluster
    AddShard {
        /// Shard address (host:port)
        server: String,

        /// Allow a shard on localhost
        #[arg(short, long)]
        local: bool,
    },

    /// Remove a shard from the cluster (not supported by the server)
    RemoveShard {
        /// Shard address (host:port)
        server: String,
    },

    /// Show a shard's server status
    ShardStatus {
        /// Shard address (host:port)
        server: HostPort,
    },

    /// List the databases on a shard
    ShardDbs {
        /// Shard address (host:port)
        server: HostPort,
    },

    /// Enable sharding on a database
    EnableSharding {
        /// Database name
        db: String,
    },

    /// Move a database's primary shard
    MovePrimary {
        /// Database name
        db: String,
        /// Target shard address
        to: String,
    },

    /// Shard a collection
    ShardCollection {
        /// Database name
        db: String,
        /// Collection name
        collection: String,
        /// Shard key, e.g. '{"x": 1}'
        #[arg(value_parser = parse_json)]
        key: Value,
        /// Enforce a unique shard key
        #[arg(short, long)]
        unique: bool,
    },

    /// Split a chunk
    Split {
        /// Database name
        db: String,
        /// Collection name
        collection: String,
        /// Split the chunk holding the first match at its median
        #[arg(
            long,
            value_parser = parse_json,
            conflicts_with = "middle",
            required_unless_present = "middle"
        )]
        find: Option<Value>,
        /// Split at this exact shard key value
        #[arg(long, value_parser = parse_json)]
        middle: Option<Value>,
    },

    /// Move the chunk holding the first match to another shard
    MoveChunk {
        /// Database name
        db: String,
        /// Collection name
        collection: String,
        /// Query selecting the chunk
        #[arg(long, value_parser = parse_json)]
        find: Value,
        /// Target shard address
        to: String,
    },

    /// Show a collection's shard version
    Version {
        /// Database name
        #[arg(requires = "collection")]
        db: Option<String>,
        /// Collection name
        collection: Option<String>,
    },

    /// Run a command against a database
    #[command(name = "command")]
    RunCommand {
        /// Database name
        db: String,
        /// Command document; its first key names the command
        #[arg(value_parser = parse_command)]
        command: Command,
    },

    /// Authenticate against a database
    Authenticate {
        /// Database name
        db: String,
        /// User name
        username: String,
        /// Password
        #[arg(long)]
        password: String,
    },

    /// Query documents
    Find {
        /// Database name
        db: String,
        /// Collection name
        collection: String,
        /// Query document
        #[arg(long, value_parser = parse_json)]
        criteria: Option<Value>,
        /// Projection document
        #[arg(long, value_parser = parse_json)]
        fields: Option<Value>,
        /// Sort key (key[:asc|desc]), repeatable
        #[arg(long, value_parser = parse_sort)]
        sort: Vec<(String, SortOrder)>,
        /// Maximum number of documents
        #[arg(short, long)]
        limit: Option<u32>,
        /// Number of documents to skip
        #[arg(short, long)]
        skip: Option<u32>,
        /// Documents per batch
        #[arg(short, long)]
        batch_size: Option<u32>,
        /// Show the query plan
        #[arg(long)]
        explain: bool,
    },

    /// Fetch the next batch of a cursor
    More {
        /// Database name
        db: String,
        /// Collection name
        collection: String,
        /// Cursor id from a previous find
        id: i64,
        /// Documents per batch
        #[arg(short, long)]
        batch_size: Option<u32>,
    },

    /// Insert documents
    Insert {
        /// Database name
        db: String,
        /// Collection name
        collection: String,
        /// A document or an array of documents
        #[arg(value_parser = parse_json)]
        docs: Value,
        /// Wait for the server's status
        #[arg(long)]
        safe: bool,
    },

    /// Update documents
    Update {
        /// Database name
        db: String,
        /// Collection name
        collection: String,
        /// Query document
        #[arg(value_parser = parse_json)]
        criteria: Value,
        /// Replacement or modifier document
        #[arg(value_parser = parse_json)]
        newobj: Value,
        /// Insert if nothing matches
        #[arg(long)]
        upsert: bool,
        /// Update every match
        #[arg(long)]
        multi: bool,
        /// Wait for the server's status
        #[arg(long)]
        safe: bool,
    },

    /// Remove documents
    Remove {
        /// Database name
        db: String,
        /// Collection name
        collection: String,
        /// Query document; every document if omitted
        #[arg(long, value_parser = parse_json)]
        criteria: Option<Value>,
        /// Wait for the server's status
        #[arg(long)]
        safe: bool,
    },
}

/// Runs one command against the cluster.
pub async fn run<R: Requester>(conn: &Connection<R>, command: Commands) -> ClientResult<Response> {
    match command {
        Commands::Hello => conn.hello().await,
        Commands::Connect { alias } => conn.connect(alias.as_deref()).await,
        Commands::SetMongos => {
            info!(mongos = %conn.mongos(), "setting mongos");
            conn.set_mongos().await
        }
        Commands::Config => conn.get_config().await,
        Commands::Shards => conn.get_shards().await,
        Commands::AddShard { server, local } => conn.shard(server).add(Some(local)).await,
        Commands::RemoveShard { server } => conn.shard(server).remove().await,
        Commands::ShardStatus { server } => conn.shard(server.to_string()).status().await,
        Commands::ShardDbs { server } => conn.shard(server.to_string()).databases().await,
        Commands::EnableSharding { db } => conn.database(db).shard().await,
        Commands::MovePrimary { db, to } => conn.database(db).move_primary(&to).await,
        Commands::ShardCollection {
            db,
            collection,
            key,
            unique,
        } => conn.collection(&db, &collection).shard(key, Some(unique)).await,
        Commands::Split {
            db,
            collection,
            find,
            middle,
        } => {
            let criteria = ChunkCriteria { find, middle };
            conn.collection(&db, &collection).split(&criteria).await
        }
        Commands::MoveChunk {
            db,
            collection,
            find,
            to,
        } => {
            conn.collection(&db, &collection)
                .move_chunk(&ChunkCriteria::find(find), &to)
                .await
        }
        Commands::Version { db, collection } => match (db, collection) {
            (Some(db), Some(collection)) => conn.collection(&db, &collection).version().await,
            (None, None) => Ok(Response::new(json!({
                "ok": 1,
                "mongoose": env!("CARGO_PKG_VERSION"),
            }))),
            _ => Err(ClientError::invalid_argument("db and collection must both be given")),
        },
        Commands::RunCommand { db, command } => conn.command(&db, &command).await,
        Commands::Authenticate {
            db,
            username,
            password,
        } => conn.database(db).authenticate(&username, &password).await,
        Commands::Find {
            db,
            collection,
            criteria,
            fields,
            sort,
            limit,
            skip,
            batch_size,
            explain,
        } => {
            let options = FindOptions {
                criteria,
                fields,
                sort,
                limit,
                skip,
                batch_size,
                explain,
            };
            conn.collection(&db, &collection).find(&options).await
        }
        Commands::More {
            db,
            collection,
            id,
            batch_size,
        } => conn.collection(&db, &collection).more(id, batch_size).await,
        Commands::Insert {
            db,
            collection,
            docs,
            safe,
        } => {
            let docs = match docs {
                Value::Array(docs) => docs,
                doc => vec![doc],
            };
            conn.collection(&db, &collection).insert(&docs, safe).await
        }
        Commands::Update {
            db,
            collection,
            criteria,
            newobj,
            upsert,
            multi,
            safe,
        } => {
            let options = UpdateOptions { upsert, multi, safe };
            conn.collection(&db, &collection)
                .update(&criteria, &newobj, &options)
                .await
        }
        Commands::Remove {
            db,
            collection,
            criteria,
            safe,
        } => {
            conn.collection(&db, &collection)
                .remove(criteria.as_ref(), safe)
                .await
        }
    }
}
