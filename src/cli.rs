use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(
    name = "streamrank",
    version,
    about = "Rank live streams by how unusual their current viewership is"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as human-readable text instead of JSON
    #[arg(long = "human", short = 'H', global = true)]
    pub human: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config file and create the database
    Init,

    /// Manage tracked streams
    Stream {
        #[command(subcommand)]
        action: StreamAction,
    },

    /// Record viewcount samples for a stream
    Sample {
        /// Stream id or 11-character video id
        #[arg(required_unless_present = "batch")]
        stream: Option<String>,

        /// Viewer count
        #[arg(required_unless_present = "batch")]
        viewcount: Option<u64>,

        /// Sample time (RFC 3339, default: now)
        #[arg(long)]
        at: Option<String>,

        /// JSON array of {"stream", "viewcount", "timestamp"} objects
        #[arg(long, conflicts_with_all = ["stream", "viewcount", "at"])]
        batch: Option<String>,
    },

    /// Rank all live streams by anomaly score
    Rank {
        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,

        /// Scoring algorithm (overrides configuration)
        #[arg(long)]
        algorithm: Option<String>,

        /// Only trending streams
        #[arg(long)]
        trending: bool,

        /// Minimum score when --trending is set
        #[arg(long, default_value_t = 0.0, requires = "trending")]
        min_score: f64,
    },

    /// Score a single stream
    Score {
        /// Stream id or 11-character video id
        stream: String,

        /// Scoring algorithm (overrides configuration)
        #[arg(long)]
        algorithm: Option<String>,
    },

    /// Inspect and override detection settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Delete samples older than the given number of days
    Prune {
        #[arg(long)]
        days: u32,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum StreamAction {
    /// Start tracking a stream
    Add {
        /// 11-character video id
        external_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        channel: String,
    },
    /// List tracked streams
    List {
        /// Only live streams
        #[arg(long)]
        live: bool,
    },
    /// Mark a stream live or ended
    Live {
        /// Stream id or 11-character video id
        stream: String,
        /// Mark the stream as ended instead
        #[arg(long)]
        off: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show effective detection settings
    Show,
    /// List overridable keys
    Keys,
    /// Store an override
    Set {
        /// Dot-notation key (e.g. quantile_params.spike_threshold)
        key: String,
        value: String,
    },
    /// Remove an override
    Reset { key: String },
}
