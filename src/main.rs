use tracing_subscriber::EnvFilter;

/// Parses the command line and runs the requested command against the
/// configured server. Any failure is printed and exits with status 1.
#[tokio::main]
async fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mongocoba=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = mongocoba::cli::handle_cli().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
