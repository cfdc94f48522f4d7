// Main entry point for imgproc-server.
// Parses configuration, sets up logging, builds the Axum router and serves
// the image endpoints until a shutdown signal arrives.

mod shutdown_signal;
mod web;

use clap::Parser;
use shutdown_signal::shutdown_signal;
use tracing::Level;

/// Command line arguments for imgproc-server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct AppConfig {
    /// Hostname/IP to bind the server to.
    /// If this option is specified without value, it will default to "*", meaning the server will listen on all interfaces.
    #[arg(long, env = "IMGPROC_SERVER_HOST", default_value = "localhost", num_args = 0..=1, default_missing_value = "*")]
    host: String,

    /// Port number to listen on.
    #[arg(short, long, env = "IMGPROC_SERVER_PORT", default_value_t = 8000)]
    port: u16,

    /// Maximum accepted request body size in bytes.
    #[arg(long, env = "IMGPROC_SERVER_MAX_UPLOAD_SIZE", default_value_t = web::MAX_IMAGE_SIZE_BYTES)]
    max_upload_size: usize,
}

#[tokio::main]
async fn main() {
    let config = AppConfig::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting imgproc-server...");
    tracing::info!("Maximum upload size: {} bytes", config.max_upload_size);

    let app = web::create_app(config.max_upload_size);

    let listener = match web::create_listener(&config.host, config.port).await {
        Ok((addr, l)) => {
            tracing::info!("Server successfully bound. Listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("FATAL: Failed to bind server: {}", e);
            eprintln!("FATAL: Could not bind server. Error: {}. Exiting.", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server run error: {}", e);
        eprintln!("ERROR: Server shut down unexpectedly. Error: {}", e);
    }

    tracing::info!("imgproc-server has shut down.");
}
