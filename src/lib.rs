//! # Lineseek
//!
//! Random access by line number into a large, static, newline-delimited file,
//! shared by many worker processes.
//!
//! ## Features
//!
//! - **Lazy chunked index**: byte offsets are recorded in fixed-size chunks,
//!   only as far into the file as requests have reached
//! - **Shared state**: the index, the build frontier and memoized lines live
//!   in a cache store every process can reach
//! - **One scanner at a time**: a global build lock with crash-safe expiry
//!   keeps each region of the file from being scanned twice
//! - **Memoized content**: a local LRU in front of the shared store
//!
//! ## Modules
//!
//! - [`store`]: Cache store trait with memory and SQLite backends
//! - [`index`]: Offset tables, build coordination and the index builder
//! - [`service`]: The `fetch_record` facade
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lineseek::{Config, LineService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.file.path = "data/sample.dat".into();
//!
//!     let service = LineService::open(&config).await?;
//!
//!     match service.fetch_line(41).await? {
//!         Some(line) => println!("{}", line),
//!         None => println!("past the end of the file"),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod index;
pub mod logging;
pub mod prewarm;
pub mod reader;
pub mod sample;
pub mod service;
pub mod store;

pub use cache::{CacheStats, ContentCache};
pub use config::{Config, ConfigError, StoreKind};
pub use error::{LineError, LineResult};
pub use index::{ChunkLayout, ChunkLookup, IndexStats, KeySpace, OffsetIndexBuilder, OffsetTable};
pub use prewarm::{PrewarmJob, PrewarmOutcome, PrewarmStatus};
pub use reader::FileReader;
pub use sample::generate_sample_file;
pub use service::{LineService, ServiceStats};
pub use store::{open_store, CacheStore, MemoryStore, SqliteStore, StoreError, StoreResult};
