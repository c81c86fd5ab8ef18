//! Clap derive structures for the `reqflow` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// reqflow -- declarative HTTP commands from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "reqflow",
    version,
    about = "Run declarative HTTP commands from the command line",
    long_about = "Fire ad-hoc requests or named commands from your config file.\n\n\
        Requests go through the same dispatcher a library client uses:\n\
        retries, timeouts, auth, and streaming uploads with progress.",
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
    /// Profile to use
    #[arg(long, short = 'p', env = "REQFLOW_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Base URL for relative endpoints (overrides profile)
    #[arg(long, short = 'b', env = "REQFLOW_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Auth token (overrides profile credentials)
    #[arg(long, env = "REQFLOW_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "REQFLOW_OUTPUT",
        default_value = "json",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "REQFLOW_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "REQFLOW_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table for listings, status + body for responses
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

#[derive(Debug, Clone, ValueEnum)]
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
    /// Send an ad-hoc request
    #[command(alias = "f")]
    Fetch(FetchArgs),

    /// Run a named command from the config file
    #[command(alias = "r")]
    Run(RunArgs),

    /// Inspect named commands
    #[command(alias = "cmd")]
    Commands(CommandsArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared Request Arguments ─────────────────────────────────────────

/// Call-time values shared by `fetch` and `run`.
#[derive(Debug, Args)]
pub struct RequestArgs {
    /// Path parameter, `name=value` (repeatable)
    #[arg(long = "param", short = 'P', value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    /// Query parameter, `name=value`; JSON values are parsed (repeatable)
    #[arg(long = "query", short = 'Q', value_name = "NAME=VALUE")]
    pub query: Vec<String>,

    /// Request header, `Name: value` or `name=value` (repeatable)
    #[arg(long = "header", short = 'H', value_name = "HEADER")]
    pub headers: Vec<String>,

    /// Request body: inline JSON, plain text, or `@path` to read a file
    #[arg(long, short = 'd')]
    pub data: Option<String>,

    /// Show an upload/download progress bar on stderr
    #[arg(long)]
    pub progress: bool,
}

// ── Fetch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Endpoint template or absolute URL (e.g. /users/:id)
    pub endpoint: String,

    /// HTTP method
    #[arg(long, short = 'X', default_value = "GET")]
    pub method: String,

    #[command(flatten)]
    pub request: RequestArgs,

    /// Retry failed attempts this many times
    #[arg(long, default_value = "0")]
    pub retry: u32,

    /// Delay between retries in milliseconds
    #[arg(long, value_name = "MS")]
    pub retry_time: Option<u64>,

    /// Use the streaming transport
    #[arg(long)]
    pub streaming: bool,

    /// Upload chunk size in bytes (streaming transport)
    #[arg(long, value_name = "BYTES")]
    pub chunk_size: Option<usize>,

    /// Skip the auth header
    #[arg(long)]
    pub no_auth: bool,
}

// ── Run ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Name of a `[commands.<name>]` table
    pub name: String,

    #[command(flatten)]
    pub request: RequestArgs,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CommandsArgs {
    #[command(subcommand)]
    pub command: CommandsCommand,
}

#[derive(Debug, Subcommand)]
pub enum CommandsCommand {
    /// List named commands
    #[command(alias = "ls")]
    List,

    /// Show one named command with its derived keys
    Show {
        /// Command name
        name: String,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive setup wizard
    Init,

    /// Show the current configuration (tokens redacted)
    Show,

    /// Print the config file path
    Path,

    /// List profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name
        name: String,
    },

    /// Store a profile's token in the system keyring
    SetToken {
        /// Profile name (defaults to the active profile)
        #[arg(long)]
        profile: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

