use std::path::PathBuf;

use clap::Parser;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(
    name = "whittle",
    about = "Minimizes a failing state-database operation trace",
    long_about = "Replays a recorded operation trace against a freshly prepared state \
                  database per candidate and searches for a much smaller subsequence \
                  that still reproduces the failure.",
    version
)]
pub struct Cli {
    #[arg(
        value_name = "TRACE_FILE",
        required = true,
        help = "Trace files to load, in replay order."
    )]
    pub trace_files: Vec<PathBuf>,

    #[arg(
        long = "output",
        short = 'o',
        value_name = "PATH",
        help = "Where to write the minimized trace."
    )]
    pub output: PathBuf,

    #[arg(
        long = "db-impl",
        default_value = "memory",
        value_name = "IMPL",
        help = "State database implementation to replay against.",
        help_heading = "Backend options",
        env = "WHITTLE_DB_IMPL"
    )]
    pub db_impl: String,

    #[arg(
        long = "db-variant",
        value_name = "VARIANT",
        help = "Backend-specific variant.",
        help_heading = "Backend options"
    )]
    pub db_variant: Option<String>,

    #[arg(
        long = "tmp-dir",
        value_name = "DIR",
        help = "Directory for ephemeral backend instances; defaults to the OS temp dir.",
        help_heading = "Backend options",
        env = "WHITTLE_TMP_DIR"
    )]
    pub tmp_dir: Option<PathBuf>,

    #[arg(
        long = "schema",
        value_name = "N",
        help = "Backend-specific schema version.",
        help_heading = "Backend options"
    )]
    pub schema: Option<u32>,

    #[arg(
        long = "chain-id",
        default_value_t = 250,
        value_name = "ID",
        help = "Chain id the backend is configured with.",
        help_heading = "Backend options"
    )]
    pub chain_id: u64,

    #[arg(
        long = "seed",
        default_value_t = 0,
        value_name = "SEED",
        help = "Random seed for address sampling; values <= 0 seed from the wall clock.",
        help_heading = "Minimizer options"
    )]
    pub seed: i64,

    #[arg(
        long = "sample-runs",
        default_value_t = 5,
        value_name = "N",
        help = "Random address samples drawn per sample size.",
        help_heading = "Minimizer options"
    )]
    pub sample_runs: usize,

    #[arg(
        long = "max-factor",
        value_name = "N",
        help = "Ceiling for the initial address sample size.",
        help_heading = "Minimizer options"
    )]
    pub max_factor: Option<usize>,

    #[arg(
        long = "log.level",
        default_value_t = Level::INFO,
        value_name = "LOG_LEVEL",
        help = "The verbosity level used for logs.",
        long_help = "Possible values: info, debug, trace, warn, error"
    )]
    pub log_level: Level,
}
