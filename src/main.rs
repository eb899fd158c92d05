//! Photo Gallery HTTP Server
//!
//! Serves a random photo the viewer hasn't seen yet, streams photo files,
//! edits their embedded title, and accepts uploads. The viewer's browser
//! remembers what it has seen and sends that list with every request, so
//! the server keeps no per-viewer state.
//!
//! ## Rust concepts
//! - `#[tokio::main]` async entry point
//! - `clap` derive for command-line parsing
//! - `Box<dyn Error>` + `?` for startup failures
//! - Graceful shutdown on Ctrl-C / SIGTERM
//!
//! ## Usage
//! ```sh
//! ./target/release/photo-gallery-rs --images-dir ~/Pictures --port 3000
//! ./target/release/photo-gallery-rs --config config.json
//! ```

use clap::Parser;
use photo_gallery_rs::config::{Args, GalleryConfig};
use photo_gallery_rs::server::{self, AppState};
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    let config = GalleryConfig::resolve(Args::parse())?;

    tracing::info!("Photo Gallery Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Images dir: {}", config.images_dir.display());
    tracing::info!("Public dir: {}", config.public_dir.display());
    tracing::info!("Upload limit: {} bytes", config.max_upload_bytes);

    let app = server::create_router(AppState::new(&config));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("API Documentation: http://localhost:{}/docs", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
