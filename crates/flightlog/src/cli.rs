//! Clap derive structures for the `flightlog` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// flightlog -- list and download onboard logs from MAVLink vehicles
#[derive(Debug, Parser)]
#[command(
    name = "flightlog",
    version,
    about = "List and download onboard logs from MAVLink vehicles",
    long_about = "Talks the MAVLink log-transfer protocol (LOG_REQUEST_LIST, \
        LOG_REQUEST_DATA, LOG_REQUEST_END) over UDP.\n\n\
        The vehicle serves one transfer session at a time; a new list or \
        fetch replaces whatever was running.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Vehicle profile to use
    #[arg(long, short = 'p', env = "FLIGHTLOG_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Local UDP address to bind (overrides profile)
    #[arg(long, env = "FLIGHTLOG_BIND", global = true)]
    pub bind: Option<String>,

    /// Vehicle UDP address; learned from the first packet when omitted
    #[arg(long, short = 'r', env = "FLIGHTLOG_REMOTE", global = true)]
    pub remote: Option<String>,

    /// Vehicle MAVLink system id
    #[arg(long, global = true)]
    pub target_system: Option<u8>,

    /// Vehicle MAVLink component id
    #[arg(long, global = true)]
    pub target_component: Option<u8>,

    /// Talk to a built-in simulated vehicle instead of the network
    #[arg(long, env = "FLIGHTLOG_SIMULATE", global = true)]
    pub simulate: bool,

    /// Seconds to wait for the vehicle before giving up
    #[arg(long, env = "FLIGHTLOG_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Output format (defaults to the config file's, else table)
    #[arg(long, short = 'o', env = "FLIGHTLOG_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the logs stored on the vehicle
    #[command(alias = "ls")]
    List(ListArgs),

    /// Download one log
    #[command(alias = "get")]
    Fetch(FetchArgs),

    /// Print every log entry and data chunk the vehicle sends
    Watch(WatchArgs),

    /// Send a single log-transfer command without coordination
    Raw(RawArgs),

    /// Stop whatever transfer the vehicle is running
    End,

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Log commands ─────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ListArgs {
    /// First log id to list
    #[arg(long, default_value_t = 0)]
    pub start: u16,

    /// Last log id to list (65535 = all)
    #[arg(long, default_value_t = flightlog_link::LIST_END_ALL)]
    pub end: u16,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Log id to download
    pub id: u16,

    /// Byte offset to start at
    #[arg(long, default_value_t = 0)]
    pub offset: u32,

    /// Number of bytes to download (default: to the end of the log)
    #[arg(long)]
    pub count: Option<u32>,

    /// Write the log here instead of stdout
    #[arg(long = "out", short = 'O')]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many records
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct RawArgs {
    #[command(subcommand)]
    pub command: RawCommand,
}

#[derive(Debug, Subcommand)]
pub enum RawCommand {
    /// Send LOG_REQUEST_LIST
    List {
        #[arg(long, default_value_t = 0)]
        start: u16,
        #[arg(long, default_value_t = flightlog_link::LIST_END_ALL)]
        end: u16,
    },

    /// Send LOG_REQUEST_DATA
    Data {
        id: u16,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long, default_value_t = flightlog_link::DATA_COUNT_ALL)]
        count: u32,
    },

    /// Send LOG_REQUEST_END
    End,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create the config file with guided setup
    Init,

    /// Display current configuration
    Show,

    /// Print the config file location
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
