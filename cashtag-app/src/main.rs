use anyhow::{Context, Result};
use cashtag_common::observability::{LogConfig, init_logging};
use cashtag_config::{CashtagConfig, CashtagConfigLoader, LoggingConfig};
use cashtag_scan::output::read_mentions;
use cashtag_scan::{ScanReport, StopReason, TickerCount, run_scan, top_mentions};
use clap::Parser;
use cli::{Cli, Command, ScanArgs};
use std::path::Path;
use tokio_util::sync::CancellationToken;
mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // File first, then CASHTAG__* environment, then flags.
    let mut cfg: CashtagConfig = CashtagConfigLoader::new()
        .with_optional_file(&cli.config)
        .load()
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    let command = cli.command.unwrap_or(Command::Scan(ScanArgs::default()));
    if let Command::Scan(args) = &command {
        args.apply(&mut cfg);
        cfg.validate().context("invalid scan options")?;
    }

    if let Some(format) = cli.log_format {
        cfg.logging.format = format;
    }
    let log_path = init_logging(log_config(&cfg.logging))?;
    tracing::info!(log = %log_path.display(), config = %cli.config.display(), "app.start");

    match command {
        Command::Scan(_) => scan(&cfg).await,
        Command::Top { input, limit } => top(&input, limit),
    }
}

fn log_config(cfg: &LoggingConfig) -> LogConfig {
    LogConfig {
        app_name: "cashtag",
        log_dir: cfg.dir.clone(),
        emit_stderr: cfg.stderr,
        format: cfg.format,
        default_filter: cfg.filter.clone(),
    }
}

async fn scan(cfg: &CashtagConfig) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("app.interrupted");
            on_signal.cancel();
        }
    });

    let report = run_scan(cfg, chrono::Utc::now(), cancel)
        .await
        .context("scan failed")?;
    print_summary(&report);
    Ok(())
}

fn top(input: &Path, limit: usize) -> Result<()> {
    let mentions =
        read_mentions(input).with_context(|| format!("reading {}", input.display()))?;
    print_ranking(&top_mentions(&mentions, limit));
    Ok(())
}

fn print_summary(report: &ScanReport) {
    let outcome = &report.outcome;
    println!(
        "{} .. {}: {} mentions from {} posts ({} skipped) in {} requests",
        report.window.start.format("%Y-%m-%d %H:%M"),
        report.window.end.format("%Y-%m-%d %H:%M"),
        outcome.mentions.len(),
        outcome.posts_seen,
        outcome.posts_skipped,
        outcome.requests,
    );
    if outcome.stop == StopReason::Cancelled {
        println!("interrupted; partial results kept");
    }
    println!("wrote {}", report.output_path.display());
    print_ranking(&report.top);
}

fn print_ranking(ranking: &[TickerCount]) {
    for (rank, count) in ranking.iter().enumerate() {
        println!("{:>3}. {:<6} {}", rank + 1, count.ticker, count.mentions);
    }
}
