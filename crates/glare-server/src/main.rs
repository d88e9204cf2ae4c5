use clap::Parser;
use glare_server::Store;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "glare-server", about = "In-memory Glare artifact API server")]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 9494)]
    port: u16,

    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Require this token in X-Auth-Token on every API request.
    #[arg(long, env = "GLARE_SERVER_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let addr = format!("{}:{}", cli.bind, cli.port);
    info!("starting glare-server on {addr}");
    if cli.token.is_none() {
        info!("no token configured, requests are not authenticated");
    }

    let store = Arc::new(Store::new(cli.token));
    match glare_server::run_server(&store, &addr) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("failed to serve on {addr}: {e}");
            ExitCode::FAILURE
        }
    }
}
