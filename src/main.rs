//! warc-framer CLI

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use warc_framer::reader::{is_gzipped, WarcRecords};
use warc_framer::{Config, WarcParser};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("warc-framer v{}", env!("CARGO_PKG_VERSION"));
        eprintln!();
        eprintln!("Usage: warc-framer <command> <file> [--config <path>]");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  dump      Print one line per record");
        eprintln!("  stats     Show record counts per type");
        eprintln!("  info      Show whether the file is gzip-compressed");
        process::exit(1);
    }

    let command = &args[1];
    let file = PathBuf::from(&args[2]);

    let result = load_config(&args[3..]).and_then(|config| match command.as_str() {
        "dump" => dump(&file, &config),
        "stats" => show_stats(&file, &config),
        "info" => show_info(&file),
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'warc-framer' for usage information.");
            process::exit(1);
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn load_config(options: &[String]) -> Result<Config> {
    match options {
        [] => Ok(Config::default()),
        [flag, path] if flag == "--config" => Config::from_file(Path::new(path))
            .with_context(|| format!("loading config from {path}")),
        _ => anyhow::bail!("unexpected arguments: {}", options.join(" ")),
    }
}

fn records(file: &Path, config: &Config) -> Result<WarcRecords<warc_framer::reader::Source>> {
    WarcParser::from_config(Some(file.to_path_buf()), &config.reader)
        .records()
        .with_context(|| format!("opening {}", file.display()))
}

fn dump(file: &Path, config: &Config) -> Result<()> {
    for record in records(file, config)? {
        let record = record.with_context(|| format!("reading {}", file.display()))?;
        let record_type = record
            .record_type()
            .map_or_else(|| "-".to_string(), |t| t.to_string());
        println!(
            "{:>10}  {:<10} {} {} {}",
            record.stream_pos(),
            record_type,
            record.record_id().unwrap_or("-"),
            record.target_uri().unwrap_or("-"),
            record.content().len()
        );
    }
    Ok(())
}

fn show_stats(file: &Path, config: &Config) -> Result<()> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut total_records = 0u64;
    let mut total_bytes = 0u64;

    for record in records(file, config)? {
        let record = record.with_context(|| format!("reading {}", file.display()))?;
        let record_type = record
            .record_type()
            .map_or_else(|| "(none)".to_string(), |t| t.to_string());
        *counts.entry(record_type).or_default() += 1;
        total_records += 1;
        total_bytes += record.content().len() as u64;
    }

    println!("WARC file: {}", file.display());
    println!();
    for (record_type, count) in &counts {
        println!("  {record_type:<12} {count}");
    }
    println!();
    println!("Records:       {total_records}");
    println!("Content bytes: {total_bytes}");
    Ok(())
}

fn show_info(file: &Path) -> Result<()> {
    let gzipped = is_gzipped(file).with_context(|| format!("inspecting {}", file.display()))?;
    println!("WARC file: {}", file.display());
    println!("Compressed: {}", if gzipped { "gzip" } else { "no" });
    Ok(())
}
