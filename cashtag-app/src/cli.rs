use cashtag_common::observability::LogFormat;
use cashtag_config::CashtagConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "cashtag")]
#[command(about = "Count stock ticker mentions in subreddit post titles", long_about = None)]
pub struct Cli {
    /// YAML configuration file; skipped if it does not exist.
    #[arg(long, env = "CASHTAG_CONFIG", default_value = "cashtag.yaml", global = true)]
    pub config: PathBuf,

    /// `text` or `json`; overrides `logging.format`.
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Page through the lookback window and write ticker mentions to CSV
    Scan(ScanArgs),
    /// Rank tickers in a previously written CSV
    Top {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Debug, Default, Args)]
pub struct ScanArgs {
    #[arg(long)]
    pub lookback_days: Option<u32>,
    #[arg(long)]
    pub page_size: Option<u32>,
    #[arg(long)]
    pub subreddit: Option<String>,
    /// Write here instead of the window-derived file name
    #[arg(long)]
    pub output_path: Option<PathBuf>,
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

impl ScanArgs {
    /// Flags win over file and environment values.
    pub fn apply(&self, cfg: &mut CashtagConfig) {
        if let Some(days) = self.lookback_days {
            cfg.window.lookback_days = days;
        }
        if let Some(size) = self.page_size {
            cfg.search.page_size = size;
        }
        if let Some(subreddit) = &self.subreddit {
            cfg.search.subreddit = subreddit.clone();
        }
        if let Some(dir) = &self.output_dir {
            cfg.output.dir = dir.clone();
        }
        if let Some(path) = &self.output_path {
            cfg.output.path = Some(path.clone());
        }
    }
}
