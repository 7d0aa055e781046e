use clap::{Parser, Subcommand};
use sqlgate_core::GatewayConfig;
use sqlgate_mcp::{GatewayServer, ToolExecutor};
use sqlgate_pool::{ConnectionPool, SqlBackend};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sqlgate", version, about = "Policy-gated SQL access gateway (MCP)")]
struct Cli {
    /// Path to the configuration file (default: ./sqlgate.yaml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the MCP server on stdio
    Serve,

    /// Test backend connectivity and exit non-zero on failure
    Check,

    /// List the tools the server exposes
    Tools,

    /// Print the effective configuration (passwords masked)
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries JSON-RPC frames in serve mode; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = GatewayConfig::load(cli.config.as_deref())?;

    match cli.cmd {
        Command::Serve => {
            tracing::info!(
                backend = %config.database.backend,
                host = %config.database.host,
                pool_size = config.pool.max_size,
                "starting sqlgate"
            );
            let server = GatewayServer::new(ToolExecutor::new(&config));
            server.run_stdio().await?;
            Ok(())
        }

        Command::Check => {
            let backend = SqlBackend::new(&config.database);
            let pool = ConnectionPool::new(backend, &config.pool);
            if pool.test_connection().await {
                println!("connection ok");
                pool.close_all().await;
                Ok(())
            } else {
                pool.close_all().await;
                Err(anyhow::anyhow!(
                    "could not reach {} at {}:{}",
                    config.database.backend,
                    config.database.host,
                    config.database.port()
                ))
            }
        }

        Command::Tools => {
            let server = GatewayServer::new(ToolExecutor::new(&config));
            for tool in server.tools().list() {
                println!(
                    "{:<16} {}",
                    tool.name,
                    tool.description.as_deref().unwrap_or("")
                );
            }
            Ok(())
        }

        Command::Config => {
            let mut masked = config.clone();
            if masked.database.password.is_some() {
                masked.database.password = Some("***".to_string());
            }
            println!("{}", serde_json::to_string_pretty(&masked)?);
            Ok(())
        }
    }
}
