use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use diaglog_store::{LineParser, LogStore};

/// Log every line of `reader` into the store until EOF, returning the number
/// of entries written
pub async fn ingest_lines<R>(reader: R, store: LogStore) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut count = 0;

    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        let Some(parsed) = LineParser::parse(&line) else {
            continue;
        };
        store.log(parsed.level, parsed.message, parsed.data.map(Value::Object));
        count += 1;
    }

    tracing::debug!(count, "Input exhausted");
    Ok(count)
}

/// `diaglog ingest`: read stdin to EOF, then write the export artifact
pub async fn run(store: &LogStore, export_dir: PathBuf) -> Result<PathBuf> {
    let stdin = BufReader::new(tokio::io::stdin());
    let count = ingest_lines(stdin, store.clone()).await?;

    let path = store
        .download_logs(&export_dir)
        .with_context(|| format!("Failed to export logs to {}", export_dir.display()))?;

    if count > store.len() {
        tracing::warn!(
            read = count,
            kept = store.len(),
            "Input exceeded max_logs, oldest entries were evicted"
        );
    }

    Ok(path)
}
