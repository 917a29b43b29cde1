use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "servarr-bootstrap")]
#[command(version)]
#[command(
    about = "Reconcile a self-hosted media stack toward its declared configuration",
    long_about = None
)]
pub struct Cli {
    /// Comma-separated services to configure, or "all"
    #[arg(long, default_value = "all", value_name = "LIST")]
    pub services: String,

    /// Preview changes without applying them
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = parse_bool,
        action = ArgAction::Set,
    )]
    pub dry_run: bool,

    /// Path to the stack config file
    #[arg(long, default_value = "config/config.yml", value_name = "PATH")]
    pub config: PathBuf,

    /// Also write the run summary as JSON
    #[arg(long, value_name = "PATH")]
    pub summary_file: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Lenient boolean for CI inputs: true/false, 1/0, yes/no
fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(format!("expected true or false, got '{other}'")),
    }
}
