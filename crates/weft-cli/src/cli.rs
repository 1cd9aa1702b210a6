//! CLI argument definitions for the `weft` binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use weft_model::RenderStrategy;

#[derive(Parser)]
#[command(
    name = "weft",
    version,
    about = "weft - stateful server-side component pages over HTTP",
    long_about = "Serve the weft demo application.\n\n\
                  Pages are component trees kept in a per-session store; links and\n\
                  form posts address components by path and are dispatched back to\n\
                  the stored page that rendered them."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Settings file (TOML). Keys left out keep their defaults.
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for humans, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve the demo application over HTTP.
    Serve(ServeArgs),

    /// List the page classes the demo registers.
    Pages,

    /// Load the settings file, build the application and print the result.
    CheckConfig,
}

#[derive(Parser)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long = "bind", value_name = "ADDR", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Override the render strategy from the settings file.
    #[arg(long = "render-strategy", value_enum)]
    pub render_strategy: Option<RenderStrategyArg>,

    /// Serve static resources from this directory.
    #[arg(long = "static-root", value_name = "DIR")]
    pub static_root: Option<PathBuf>,

    /// Maximum number of stored pages per page map.
    #[arg(long = "max-pages", value_name = "N")]
    pub max_pages: Option<usize>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum RenderStrategyArg {
    DirectRender,
    RedirectToBuffer,
    RedirectToRender,
}

impl From<RenderStrategyArg> for RenderStrategy {
    fn from(value: RenderStrategyArg) -> Self {
        match value {
            RenderStrategyArg::DirectRender => Self::DirectRender,
            RenderStrategyArg::RedirectToBuffer => Self::RedirectToBuffer,
            RenderStrategyArg::RedirectToRender => Self::RedirectToRender,
        }
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
