//! Lineseek CLI
//!
//! Command-line interface for lineseek operations:
//! - Fetch lines through a running server, or straight from the file
//! - Pre-warm the offset index
//! - Generate sample data and config files

use clap::{Parser, Subcommand};
use lineseek::api::dto::HealthSummary;
use lineseek::logging::{self, LogTarget};
use lineseek::{generate_sample_file, Config, LineError, LineService, PrewarmJob, PrewarmOutcome};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "lineseek")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Random access by line number into large text files")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8080", global = true)]
    pub api_url: String,

    /// Config file (default: standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch a line from the API server
    Get {
        /// 0-based line index
        #[arg(allow_hyphen_values = true)]
        index: i64,
    },

    /// Read a line directly from the configured file
    Read {
        /// 0-based line index
        #[arg(allow_hyphen_values = true)]
        index: i64,
    },

    /// Build the whole offset index now
    Prewarm,

    /// Show local index and cache statistics
    Stats,

    /// Show API server status
    Status,

    /// Generate a sample data file
    Generate {
        /// Number of lines
        count: u64,
        /// Output path (default: the configured file path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Get { index } => {
            let client = reqwest::Client::new();
            let response = client
                .get(format!("{}/lines/{}", cli.api_url, index))
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let body = resp.bytes().await?;
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&body)?;
                    stdout.write_all(b"\n")?;
                }
                Ok(resp) if resp.status() == reqwest::StatusCode::PAYLOAD_TOO_LARGE => {
                    eprintln!("Line index out of range: {}", index);
                    std::process::exit(1);
                }
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    eprintln!("Failed ({}): {}", status, text);
                    std::process::exit(1);
                }
                Err(e) => {
                    exit_unreachable(&cli.api_url, e);
                }
            }
        }

        Commands::Read { index } => {
            let config = load_config(cli.config)?;
            let service = LineService::open(&config).await?;

            match service.fetch_record(index).await {
                Ok(Some(record)) => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&record)?;
                    stdout.write_all(b"\n")?;
                }
                Ok(None) | Err(LineError::InvalidIndex(_)) => {
                    eprintln!("Line index out of range: {}", index);
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Prewarm => {
            let config = load_config(cli.config)?;
            let service = Arc::new(LineService::open(&config).await?);
            let job = PrewarmJob::new(Arc::clone(&service), std::time::Duration::ZERO);

            match job.run_once().await {
                PrewarmOutcome::Complete => {
                    let stats = service.stats().await?;
                    println!(
                        "Indexed {} chunks of {} lines",
                        stats.index.frontier, stats.chunk_size
                    );
                }
                PrewarmOutcome::UnexpectedRecord => {
                    eprintln!("File is longer than the addressable index range");
                    std::process::exit(1);
                }
                PrewarmOutcome::Failed { error } => {
                    eprintln!("Pre-warm failed: {}", error);
                    std::process::exit(1);
                }
            }
        }

        Commands::Stats => {
            let config = load_config(cli.config)?;
            let service = LineService::open(&config).await?;
            let stats = service.stats().await?;

            println!("File:        {}", stats.file.display());
            println!("Store:       {}", stats.store);
            println!("Chunk size:  {}", stats.chunk_size);
            println!("Frontier:    {}", stats.index.frontier);
            match stats.index.last_chunk {
                Some(last) => println!("Index:       complete (file ends in chunk {})", last),
                None => println!("Index:       partial"),
            }
        }

        Commands::Status => {
            let client = reqwest::Client::new();
            let response = client
                .get(format!("{}/health", cli.api_url))
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let health: HealthSummary = resp.json().await?;

                    println!("Lineseek v{}", health.version);
                    println!();
                    println!("API Status:  {}", health.status);
                    println!("Store:       {}", health.store);
                    println!("File:        {}", health.file);
                    println!("Chunk size:  {}", health.chunk_size);
                    println!();
                    println!("Uptime: {}", format_duration(health.uptime_seconds));
                }
                Ok(resp) => {
                    eprintln!("API returned error: {}", resp.status());
                    std::process::exit(1);
                }
                Err(e) => {
                    exit_unreachable(&cli.api_url, e);
                }
            }
        }

        Commands::Generate { count, output } => {
            let path = match output {
                Some(path) => path,
                None => load_config(cli.config)?.file.path,
            };
            let size = generate_sample_file(&path, count)?;
            println!("Wrote {} lines ({} bytes) to {:?}", count, size, path);
        }

        Commands::Config { output } => {
            let config = lineseek::config::generate_default_config();

            match output {
                Some(path) => {
                    // Create parent directory if needed
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

/// Load config for commands that work on the local file
fn load_config(path: Option<PathBuf>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = Config::resolve(path.as_deref())?;
    logging::init(&config.logging, LogTarget::Stderr);
    Ok(config)
}

fn exit_unreachable(api_url: &str, e: reqwest::Error) -> ! {
    eprintln!("Cannot connect to lineseek API at {}", api_url);
    eprintln!("Error: {}", e);
    eprintln!();
    eprintln!("Make sure the lineseek server is running:");
    eprintln!("  cargo run --bin lineseek");
    std::process::exit(1);
}

fn format_duration(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
