//! Configuration sourced from the CLI (component H / J).

use clap::Parser;
use std::path::PathBuf;

/// compass: a service-discovery registry/client core.
#[derive(Parser, Debug)]
pub struct Cli {
    /// Validate configuration and exit without starting any loops.
    #[arg(long)]
    pub validate_configs: bool,

    /// Path to the TOML configuration file.
    #[arg(long)]
    pub config_toml: Option<PathBuf>,

    /// Override `rateLimiterEnabled`.
    #[arg(long)]
    pub rate_limiter_enabled: Option<bool>,

    /// Override `rateLimiterBurstSize`.
    #[arg(long)]
    pub rate_limiter_burst_size: Option<i64>,

    /// Override `allowedPercentageDrop`.
    #[arg(long)]
    pub allowed_percentage_drop: Option<u8>,

    /// `tracing_subscriber` filter directive, e.g. `compass=debug`.
    #[arg(long)]
    pub log_level: Option<String>,
}
