//! Main entry point for the logbundle CLI application.
//!
//! Loads a log bundle from a local path or an HTTP URL, ingests it and
//! prints either the services it contains or the logs of a service.

use anyhow::{Result, bail};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use logbundle::{
    Cli, HttpRangeReader, LocalFileReader, LogCollection, LogRecord, ReadAt, ingest_from, to_text,
};

/// Application entry point.
///
/// Parses command-line arguments, sets up logging and dispatches on whether
/// the bundle is a local file or an HTTP URL.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if cli.is_http_url() {
        let reader = HttpRangeReader::new(cli.file.clone()).await?;
        let transferred_before = reader.transferred_bytes();
        let reader = Arc::new(reader);

        process_bundle(reader.clone(), &cli).await?;

        if !cli.is_quiet() {
            let transferred = reader.transferred_bytes() - transferred_before;
            eprintln!("\nTotal bytes transferred: {}", format_size(transferred));
        }
    } else {
        let reader = Arc::new(LocalFileReader::new(Path::new(&cli.file))?);
        process_bundle(reader, &cli).await?;
    }

    Ok(())
}

/// Ingest the bundle and either list it (`-l`, `-v`) or show logs.
async fn process_bundle<R: ReadAt + 'static>(reader: Arc<R>, cli: &Cli) -> Result<()> {
    let logs = ingest_from(reader, &cli.ingest_config()).await?;

    if logs.is_empty() {
        if !cli.is_quiet() {
            eprintln!("No logs found in {}", cli.file);
        }
        return Ok(());
    }

    if cli.list || cli.verbose {
        list_logs(&logs, cli.verbose);
        return Ok(());
    }

    show_logs(&logs, cli).await
}

/// List the bundle.
///
/// - Simple format (`-l`): service names, one per line
/// - Verbose format (`-v`): every log with timestamp, size and path, newest first
fn list_logs(logs: &LogCollection, verbose: bool) {
    if !verbose {
        for service in logs.list_services() {
            println!("{}", service);
        }
        return;
    }

    println!(
        "{:<19}  {:>10}  {:<24}  Path",
        "Timestamp", "Size", "Service"
    );
    println!("{}", "-".repeat(80));

    for record in logs.records() {
        let timestamp = record
            .timestamp()
            .map(|at| at.format("%Y-%m-%dT%H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<19}  {:>10}  {:<24}  {}",
            timestamp,
            format_size(record.body().len() as u64),
            record.service_name(),
            record.source_path()
        );
    }

    let stats = logs.stats();
    println!("{}", "-".repeat(80));
    println!(
        "{} logs from {} services, {} skipped, {} decoded in {:.2?}",
        stats.records,
        logs.list_services().count(),
        stats.skipped,
        format_size(stats.bytes as u64),
        stats.elapsed
    );
}

/// Print (or save with `-o`) the logs of one service, or of all with `-a`.
///
/// With `-L` or `-g` only the matching lines are shown, one per event.
async fn show_logs(logs: &LogCollection, cli: &Cli) -> Result<()> {
    let shown: Vec<&LogRecord> = if cli.all {
        logs.records().iter().collect()
    } else {
        let service = match cli.select.as_deref() {
            Some(service) if logs.has_service(service) => service,
            Some(service) => {
                let known: Vec<_> = logs.list_services().collect();
                bail!(
                    "No logs for service {} (available: {})",
                    service,
                    known.join(", ")
                );
            }
            // Non-empty collection, so there is a newest record
            None => logs.default_service().unwrap_or_default(),
        };
        logs.filter(service).collect()
    };

    let text = match cli.line_filter()? {
        Some(filter) => {
            let mut text = String::new();
            for line in filter.select(shown.iter().copied()) {
                text.push_str(&line.to_string());
                text.push('\n');
            }
            text
        }
        None => to_text(shown.iter().copied()),
    };

    if let Some(ref output) = cli.output {
        tokio::fs::write(output, text.as_bytes()).await?;
        if !cli.is_quiet() {
            eprintln!("Wrote {} logs to {}", shown.len(), output);
        }
    } else {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(text.as_bytes()).await?;
        stdout.flush().await?;
    }

    Ok(())
}

/// Format a byte size into a human-readable string.
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
