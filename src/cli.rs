//! Command-line arguments.

use clap::{Parser, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "rollcall", version, about = "Attendance SMS dispatch service")]
pub struct Args {
    /// Log output format.
    #[arg(long, value_enum, env = "LOG_FORMAT", default_value_t = TracingFormat::Pretty)]
    pub log_format: TracingFormat,

    /// Listen port; overrides the PORT environment variable.
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TracingFormat {
    /// Human-readable multi-line output for local runs.
    Pretty,
    /// One JSON object per line for log shippers.
    Json,
}
