//! Lineseek API Server
//!
//! Run with: cargo run --bin lineseek
//!
//! # Configuration
//!
//! - `LINESEEK_CONFIG`: Config file (default: first of the standard locations)
//! - `LINESEEK_*` / `FILE_PATH` / `FILE_READER_CHUNK_SIZE`: overrides, see `lineseek-cli config`
//! - `RUST_LOG`: Log filter (default: `logging.level`)

use lineseek::api::{serve, AppState};
use lineseek::logging::{self, LogTarget};
use lineseek::{Config, LineService, PrewarmJob};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var_os("LINESEEK_CONFIG").map(PathBuf::from);
    let config = Config::resolve(config_path.as_deref())?;

    logging::init(&config.logging, LogTarget::Stdout);

    tracing::info!("Starting lineseek v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("File: {:?}", config.file.path);

    let service = Arc::new(LineService::open(&config).await?);
    let mut state = AppState::new(Arc::clone(&service), &config.api);

    let prewarm_handle = if config.prewarm.enabled {
        let job = Arc::new(PrewarmJob::new(
            Arc::clone(&service),
            config.prewarm.delay(),
        ));
        state = state.with_prewarm(Arc::clone(&job));
        Some(job.start())
    } else {
        tracing::info!("Pre-warm disabled");
        None
    };

    serve(state, &config.api).await?;

    if let Some(handle) = prewarm_handle {
        // Dropping an unfinished scan releases its build lock
        handle.abort();
    }

    tracing::info!("Lineseek stopped");
    Ok(())
}
