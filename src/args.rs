use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Clone, Debug)]
#[command(
    display_name = "Skill Processor",
    long_about = "Infers time-varying skill ratings for 5v5 team matches from their outcomes and stats"
)]
pub struct Args {
    /// JSON array of matches. Order does not matter, matches are sorted by date and id.
    #[arg(short, long, env = "SKILL_MATCHES", help = "Path to the match history")]
    pub matches: PathBuf,

    /// JSON object mapping player id to `[mean, variance]`
    #[arg(short, long, env = "SKILL_PRIORS", help = "Path to the player priors")]
    pub priors: Option<PathBuf>,

    #[arg(short, long, env = "SKILL_OUTPUT", default_value = "skills.json", help = "Where to write the results")]
    pub output: PathBuf,

    /// A JSON inference configuration. When absent the configuration is read
    /// from `SKILL_*` environment variables.
    #[arg(short, long, help = "Path to the inference configuration")]
    pub config: Option<PathBuf>,

    /// Overrides the batch window of the configuration
    #[arg(short, long, help = "Batch window in days")]
    pub batch_days: Option<i64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        env = "RUST_LOG",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"],
        help = "Sets the logging verbosity"
    )]
    pub log_level: String
}
