use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "pulse",
    about = "PULSE: paradox field construction, core projection, and contract checks",
    version
)]
pub struct Cli {
    /// Log verbosity on stderr
    #[arg(long, global = true, value_enum, default_value = "warn", env = "PULSE_LOG")]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_spec(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a paradox field and its edge set from a run comparison
    FieldBuild {
        /// Path to run comparison JSON
        #[arg(long)]
        comparison: String,

        /// Output path for the field JSON
        #[arg(long)]
        out: String,

        /// Output path for the edges JSONL
        #[arg(long)]
        edges_out: String,

        /// Path to linker config TOML (defaults apply when omitted)
        #[arg(long)]
        config: Option<String>,

        /// Record meta.created_at_utc (excluded from the field digest)
        #[arg(long)]
        emit_created_at_now: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Project a bounded top-k core from a field
    CoreProject {
        /// Path to field JSON
        #[arg(long)]
        field: String,

        /// Path to edges JSONL
        #[arg(long)]
        edges: Option<String>,

        /// Output path for the core JSON
        #[arg(long)]
        out: String,

        /// Number of atoms to keep
        #[arg(long, default_value_t = pulse_paradox::DEFAULT_K)]
        k: usize,

        /// Selection metric
        #[arg(long, default_value = "severity")]
        metric: String,

        /// Tie-break among equally significant atoms
        #[arg(long, default_value = "atom_id")]
        tie_break: String,

        /// Edge policy: drop_external or fail_on_external
        #[arg(long, default_value = "drop_external")]
        edge_policy: String,

        /// Record meta.created_at_utc
        #[arg(long)]
        emit_created_at_now: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a field (and optionally its edges) against the contract
    FieldCheck {
        /// Path to field JSON
        #[arg(long)]
        field: String,

        /// Path to edges JSONL
        #[arg(long)]
        edges: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a core projection against the contract
    CoreCheck {
        /// Path to core JSON
        #[arg(long)]
        core: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
