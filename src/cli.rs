use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sceneclip")]
#[command(author, version, about = "Cut a time window out of a media file and re-encode it")]
#[command(allow_negative_numbers = true)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the trim report as JSON
    #[arg(long)]
    pub json: bool,

    /// Input media file
    pub input: PathBuf,

    /// Window start in seconds
    pub start: f64,

    /// Window end in seconds
    pub end: f64,

    /// Output media file
    pub output: PathBuf,
}
