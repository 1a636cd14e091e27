//! warden - policy-enforcing SQL access to PostgreSQL.

use std::sync::Arc;

use serde::Serialize;
use sql_warden::cli::{parse_params, Cli, Command};
use sql_warden::config::Config;
use sql_warden::db::{self, DatabaseClient, Record};
use sql_warden::error::{Result, WardenError};
use sql_warden::logging;
use sql_warden::query::{QueryExecutor, SecurityInfo};
use sql_warden::safety::{authorize, classify, Classification, SecurityMode, ValidationResult};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    if cli.verbose {
        logging::init_stderr_logging_with("debug");
    } else {
        logging::init_stderr_logging();
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(conn) = cli.to_connection_config()? {
        config.database.merge(&conn);
    }

    if !cli.command.needs_database() {
        return run_offline(&cli.command, &config);
    }

    info!("Connecting to {}", config.database.display_string());
    let client: Arc<dyn DatabaseClient> = Arc::from(db::connect(&config.database).await?);
    let executor = QueryExecutor::new(Arc::clone(&client), config.security);

    let result = run_online(&cli.command, &executor).await;
    if let Err(e) = client.close().await {
        debug!("Error closing connection: {}", e);
    }
    result
}

#[derive(Serialize)]
struct CheckReport {
    mode: SecurityMode,
    classification: Classification,
    #[serde(flatten)]
    verdict: ValidationResult,
}

#[derive(Serialize)]
struct TableDescription {
    schema: String,
    table: String,
    columns: Vec<Record>,
    indexes: Vec<Record>,
    constraints: Vec<Record>,
}

#[derive(Serialize)]
struct PingReport {
    connected: bool,
}

fn run_offline(command: &Command, config: &Config) -> Result<()> {
    match command {
        Command::Classify { sql } => print_json(&classify(sql)),
        Command::Check { sql, mode } => {
            let mode = mode.unwrap_or(config.security.security_mode);
            print_json(&CheckReport {
                mode,
                classification: classify(sql),
                verdict: authorize(sql, mode),
            })
        }
        Command::Security => print_json(&SecurityInfo::from_settings(&config.security)),
        _ => Err(WardenError::internal("command requires a database connection")),
    }
}

async fn run_online(command: &Command, executor: &QueryExecutor) -> Result<()> {
    match command {
        Command::Query { sql, params } => {
            let params = parse_params(params);
            let outcome = executor.execute_query(sql, Some(params.as_slice())).await?;
            print_json(&outcome)
        }
        Command::Tables { schema } => print_json(&executor.list_tables(schema).await?),
        Command::Describe { table, schema } => {
            let columns = executor.table_structure(table, schema).await?;
            if columns.is_empty() {
                return Err(WardenError::backend(format!(
                    "Table '{schema}.{table}' not found"
                )));
            }
            print_json(&TableDescription {
                schema: schema.clone(),
                table: table.clone(),
                columns,
                indexes: executor.table_indexes(table, schema).await?,
                constraints: executor.table_constraints(table, schema).await?,
            })
        }
        Command::Schemas => print_json(&executor.available_schemas().await?),
        Command::Ping => print_json(&PingReport {
            connected: executor.test_connection().await,
        }),
        Command::Classify { .. } | Command::Check { .. } | Command::Security => Err(
            WardenError::internal("offline command routed to the database"),
        ),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| WardenError::internal(format!("Failed to serialize output: {e}")))?;
    println!("{json}");
    Ok(())
}
