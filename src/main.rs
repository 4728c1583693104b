//! panel-db - command line access to the control panel database.

use clap::Parser;
use panel_db::config::{Command, Config};
use panel_db::{ConnectionRegistry, TracingSink};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; stdout carries the command output.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn run(
    registry: &ConnectionRegistry,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let shared = registry.get(&config.connection).await?;
    let mut conn = shared.lock().await;

    match &config.command {
        Command::Tables { like } => {
            for table in conn.get_tables(like.as_deref()).await? {
                println!("{}", table);
            }
        }
        Command::Query { sql, .. } => {
            let parameters = config.command.parameters()?;
            let mut result = conn.execute(sql.as_str(), parameters).await??;
            if result.column_count() == 0 {
                println!(
                    "{}",
                    json!({
                        "rows_affected": result.rows_affected(),
                        "last_insert_id": result.last_insert_id(),
                    })
                );
            } else {
                for row in result.fetch_all() {
                    println!("{}", JsonValue::Object(row));
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    let params = config.connect_params()?;
    info!(
        connection = %config.connection,
        target = %params.masked(),
        "Starting panel-db v{}",
        env!("CARGO_PKG_VERSION")
    );

    let registry = if config.trace_queries {
        ConnectionRegistry::with_event_sink(Arc::new(TracingSink))
    } else {
        ConnectionRegistry::new()
    };
    registry.connect(&config.connection, &params).await?;

    let result = run(&registry, &config).await;
    registry.close_all().await;

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        return Err(e);
    }
    Ok(())
}
