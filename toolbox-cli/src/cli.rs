//! CLI argument parsing (spec §6 / SPEC_FULL §4.15): one binary, one flat
//! command, styled after the teacher's `clap::Parser` attribute conventions.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser)]
#[command(author, version, about = "Toolbox gateway: serves tools to REST and MCP clients", long_about = None)]
#[command(group(
    clap::ArgGroup::new("tools_source")
        .args(["tools_file", "tools_files", "tools_folder", "prebuilt"])
        .multiple(false)
))]
pub struct Cli {
    /// Address to bind the HTTP listener to.
    #[arg(long, default_value = "127.0.0.1")]
    pub address: IpAddr,

    /// Port to bind the HTTP listener to.
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Load configuration from a single YAML file.
    #[arg(long, value_name = "PATH")]
    pub tools_file: Option<PathBuf>,

    /// Load and merge configuration from several YAML files.
    #[arg(long, value_name = "PATH", num_args = 1.., value_delimiter = ',')]
    pub tools_files: Vec<PathBuf>,

    /// Load and merge every *.yaml/*.yml file in a directory.
    #[arg(long, value_name = "PATH")]
    pub tools_folder: Option<PathBuf>,

    /// Load one of the bundled example configurations instead of a file.
    #[arg(long, value_name = "NAME")]
    pub prebuilt: Option<String>,

    /// Minimum log level.
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LoggingFormat::Standard)]
    pub logging_format: LoggingFormat,

    /// Run the MCP stdio transport on the process's own stdin/stdout instead
    /// of starting the HTTP listener.
    #[arg(long)]
    pub stdio: bool,

    /// Disable the hot-reload coordinator (§4.10).
    #[arg(long)]
    pub disable_reload: bool,

    /// Export telemetry via OTLP (accepted and logged; no exporter is wired,
    /// per SPEC_FULL §4.15).
    #[arg(long)]
    pub telemetry_otlp: bool,

    /// Export telemetry to Google Cloud (accepted and logged; see
    /// `--telemetry-otlp`).
    #[arg(long)]
    pub telemetry_gcp: bool,

    /// Service name to report to telemetry backends.
    #[arg(long, value_name = "NAME")]
    pub telemetry_service_name: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LoggingFormat {
    Standard,
    Json,
}
