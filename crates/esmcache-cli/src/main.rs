//! `esmcache` command-line tool for on-disk cache directories

use anyhow::{bail, Context, Result};
use base64::Engine;
use clap::{Parser, Subcommand};
use esmcache_core::cache::{key, MetaRecord, BLOB_FILE_NAME, INDEX_FILE_NAME};
use esmcache_core::fs::{FileSystem, NativeFileSystem};
use esmcache_core::{CacheIndex, PackageCache, PackageOptions};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "esmcache",
    version,
    about = "Inspect, verify and prune esmcache cache directories"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the records of a cache directory
    Inspect {
        /// Cache directory containing data.json
        dir: PathBuf,

        /// Print records as JSON
        #[arg(long)]
        json: bool,

        /// Include base64-encoded script data (JSON output only)
        #[arg(long, requires = "json")]
        show_data: bool,
    },

    /// Check data.json byte ranges against data.blob
    Verify {
        dir: PathBuf,
    },

    /// Delete artifact files that data.json no longer references
    Prune {
        dir: PathBuf,

        /// List what would be removed without deleting anything
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Inspect {
            dir,
            json,
            show_data,
        } => inspect(&dir, json, show_data),
        Command::Verify { dir } => verify(&dir),
        Command::Prune { dir, dry_run } => prune(&dir, dry_run),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Parsed index and raw blob of `dir`; either may be empty
fn load(dir: &Path) -> Result<(CacheIndex, Vec<u8>)> {
    if !dir.is_dir() {
        bail!("cache directory '{}' does not exist", dir.display());
    }

    let package = PackageCache::load(dir, PackageOptions::default(), &NativeFileSystem)
        .with_context(|| format!("failed to load cache at '{}'", dir.display()))?;
    if package.index().is_none() {
        warn!(dir = %dir.display(), "no {INDEX_FILE_NAME} found");
    }

    let index = package.index().cloned().unwrap_or_default();
    let blob = package.blob().map(<[u8]>::to_vec).unwrap_or_default();
    debug!(records = index.len(), blob_len = blob.len(), "loaded cache directory");
    Ok((index, blob))
}

fn inspect(dir: &Path, as_json: bool, show_data: bool) -> Result<()> {
    let (index, blob) = load(dir)?;

    if as_json {
        let records: Vec<_> = index
            .iter()
            .map(|(cache_key, record)| record_json(dir, cache_key, record, &blob, show_data))
            .collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    for (cache_key, record) in index.iter() {
        let kind = match &record.meta {
            Some(meta) if meta.esm => "esm",
            Some(_) => "cjs",
            None => "evicted",
        };
        let range = if record.range.is_none() {
            "-".to_string()
        } else {
            format!("[{}, {})", record.range.start, record.range.end)
        };
        let exports = record
            .meta
            .as_ref()
            .map(|meta| meta.export_names.join(", "))
            .unwrap_or_default();
        let artifact = if dir.join(cache_key).is_file() { "artifact" } else { "-" };

        println!("{cache_key}  {kind:<7}  {range:<12}  {artifact:<8}  {exports}");
    }
    println!("{} records, {} bytes of script data", index.len(), blob.len());
    Ok(())
}

fn record_json(
    dir: &Path,
    cache_key: &str,
    record: &MetaRecord,
    blob: &[u8],
    show_data: bool,
) -> serde_json::Value {
    let mut value = json!({
        "key": cache_key,
        "start": record.range.start,
        "end": record.range.end,
        "artifact": dir.join(cache_key).is_file(),
        "compressed": key::is_compressed(cache_key),
    });

    if let Some(meta) = &record.meta {
        value["esm"] = json!(meta.esm);
        value["exportNames"] = json!(meta.export_names);
        value["exportStars"] = json!(meta.export_stars);
        value["moduleSpecifiers"] = json!(meta.module_specifiers);
        value["warnings"] = json!(meta.warnings);
    }

    if show_data {
        if let Some(bytes) = record.range.slice(blob) {
            value["data"] = json!(base64::engine::general_purpose::STANDARD.encode(bytes));
        }
    }

    value
}

fn verify(dir: &Path) -> Result<()> {
    let (index, blob) = load(dir)?;

    let violations = index.check_ranges(blob.len());
    for violation in &violations {
        println!("{violation}");
    }
    if !violations.is_empty() {
        bail!(
            "{} range violation(s) in '{}'",
            violations.len(),
            dir.join(INDEX_FILE_NAME).display()
        );
    }

    println!("ok: {} records, {} blob bytes", index.len(), blob.len());
    Ok(())
}

fn prune(dir: &Path, dry_run: bool) -> Result<()> {
    let (index, _) = load(dir)?;
    let fs = NativeFileSystem;

    let files = fs
        .list_files(dir)
        .with_context(|| format!("failed to list '{}'", dir.display()))?;
    let orphans: Vec<String> = files
        .into_iter()
        .filter(|name| name != BLOB_FILE_NAME && name != INDEX_FILE_NAME)
        .filter(|name| name.ends_with(key::SCRIPT_EXT) || name.ends_with(key::GZIP_EXT))
        .filter(|name| !index.contains_key(name))
        .collect();

    for name in &orphans {
        if dry_run {
            println!("would remove {name}");
            continue;
        }
        let path = dir.join(name);
        fs.remove_file(&path)
            .with_context(|| format!("failed to remove '{}'", path.display()))?;
        info!(path = %path.display(), "removed orphaned artifact");
        println!("removed {name}");
    }

    let verb = if dry_run { "would remove" } else { "removed" };
    println!("{verb} {} orphaned artifact(s)", orphans.len());
    Ok(())
}
