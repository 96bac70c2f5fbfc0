//! Mongoose CLI
//!
//! Command-line administration of a sharded cluster through the Mongoose
//! REST gateway.
//!
//! # Commands
//!
//! - `shards` / `add-shard` / `remove-shard` - Manage cluster membership
//! - `enable-sharding` / `move-primary` - Shard a database
//! - `shard-collection` / `split` / `move-chunk` / `version` - Shard a collection
//! - `shard-status` / `shard-dbs` - Inspect a shard
//! - `find` / `more` / `insert` / `update` / `remove` - Document passthrough

mod commands;

use clap::Parser;
use commands::Commands;
use mongoose_client::{ClientConfig, CommandEncoding, Connection, HostPort, DEFAULT_GATEWAY_URL};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Sharded cluster administration through the Mongoose REST gateway.
#[derive(Parser)]
#[command(name = "mongoose")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Mongos address (host[:port])
    #[arg(global = true, short, long, default_value = "localhost:27017")]
    mongos: HostPort,

    /// Gateway base URL
    #[arg(global = true, short, long, default_value = DEFAULT_GATEWAY_URL)]
    gateway: String,

    /// Connection name sent with every request
    #[arg(global = true, short, long)]
    name: Option<String>,

    /// Send commands as plain JSON objects, without ordering hints
    #[arg(global = true, long)]
    plain_commands: bool,

    /// Request parameter that carries commands
    #[arg(global = true, long, default_value = "obj")]
    command_param: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn config(&self) -> ClientConfig {
        let encoding = if self.plain_commands {
            CommandEncoding::Plain
        } else {
            CommandEncoding::OrderingHint
        };
        let config = ClientConfig::new(self.mongos.clone())
            .with_gateway_url(self.gateway.as_str())
            .with_encoding(encoding)
            .with_command_param(self.command_param.as_str());
        match &self.name {
            Some(name) => config.with_connection_name(name.as_str()),
            None => config,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let conn = match Connection::open(cli.config()) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match commands::run(&conn, cli.command).await {
        Ok(response) => {
            match serde_json::to_string_pretty(response.as_value()) {
                Ok(text) => println!("{text}"),
                Err(_) => println!("{}", response.as_value()),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
