//! CSV persistence of ticker mentions.
use crate::mention::TickerMention;
use crate::window::TimeWindow;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const HEADER: [&str; 2] = ["CREATED_UTC", "TAG_MERGE"];
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("i/o error on {}: {error}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("csv error on {}: {error}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        error: csv::Error,
    },
    #[error("{}:{line}: {reason}", path.display())]
    Row {
        path: PathBuf,
        line: u64,
        reason: String,
    },
}

/// `{dir}/{yymmdd}_{yymmdd}_raw.csv` for the given window.
pub fn default_output_path(dir: &Path, window: &TimeWindow) -> PathBuf {
    dir.join(format!("{}_raw.csv", window.file_stem()))
}

/// Write `mentions` in order, one ticker per row. The header is written even
/// when there are no rows.
pub fn write_mentions(path: &Path, mentions: &[TickerMention]) -> Result<(), OutputError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|error| OutputError::Io {
            path: parent.to_path_buf(),
            error,
        })?;
    }
    let csv_err = |error: csv::Error| OutputError::Csv {
        path: path.to_path_buf(),
        error,
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_err)?;
    writer.write_record(HEADER).map_err(csv_err)?;
    for mention in mentions {
        let created = mention.created_utc.format(TIMESTAMP_FORMAT).to_string();
        writer
            .write_record([created.as_str(), mention.ticker.as_str()])
            .map_err(csv_err)?;
    }
    writer.flush().map_err(|error| OutputError::Io {
        path: path.to_path_buf(),
        error,
    })?;
    tracing::info!(path = %path.display(), rows = mentions.len(), "output.written");
    Ok(())
}

/// Read back a file produced by [`write_mentions`].
pub fn read_mentions(path: &Path) -> Result<Vec<TickerMention>, OutputError> {
    let csv_err = |error: csv::Error| OutputError::Csv {
        path: path.to_path_buf(),
        error,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let headers = reader.headers().map_err(csv_err)?.clone();
    if headers.iter().ne(HEADER) {
        return Err(OutputError::Row {
            path: path.to_path_buf(),
            line: 1,
            reason: format!("unexpected header {:?}", headers),
        });
    }

    let mut mentions = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row_err = |reason: String| OutputError::Row {
            path: path.to_path_buf(),
            line,
            reason,
        };
        let (Some(created), Some(ticker)) = (record.get(0), record.get(1)) else {
            return Err(row_err("expected two columns".into()));
        };
        let created = NaiveDateTime::parse_from_str(created, TIMESTAMP_FORMAT)
            .map_err(|e| row_err(format!("bad timestamp {created:?}: {e}")))?
            .and_utc();
        mentions.push(TickerMention::new(created, ticker));
    }
    Ok(mentions)
}
