use std::path::PathBuf;

use clap::Parser;

/// runtidy — Cloud Run revision and image cleaner
#[derive(Parser, Debug)]
#[command(name = "runtidy", version, about)]
pub struct Cli {
    /// gcloud configuration file (defaults to ~/.config/gcloud/configurations/config_default)
    #[arg(long, env = "RUNTIDY_CONFIG")]
    pub config: Option<PathBuf>,

    /// gcloud executable used for Artifact Registry operations
    #[arg(long, env = "RUNTIDY_GCLOUD", default_value = "gcloud")]
    pub gcloud: String,

    /// Preview changes without deleting
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}
