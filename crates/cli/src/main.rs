//! demdelta CLI - Building-height change detection between raster epochs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use walkdir::WalkDir;

use demdelta_core::io::{read_dimensions, read_geotiff, write_geotiff};
use demdelta_core::Raster;
use demdelta_detect::{compare_single, run, MetricConfig, RunConfig};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "demdelta")]
#[command(author, version, about = "Building-height change detection between raster epochs", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run change detection over a full tile collection
    Run {
        /// Run configuration file (YAML)
        #[arg(short, long)]
        config: PathBuf,
        /// Override the configured worker pool size (0 = all cores)
        #[arg(short, long)]
        threads: Option<usize>,
    },
    /// Compare a single reference/target tile pair
    Diff {
        /// Reference-epoch raster
        reference: PathBuf,
        /// Target-epoch raster
        target: PathBuf,
        /// Mean-difference threshold
        #[arg(long)]
        mean: Option<f64>,
        /// Maximum-difference threshold
        #[arg(long)]
        maxima: Option<f64>,
        /// Sum-of-differences threshold
        #[arg(long)]
        sum: Option<f64>,
        /// Pixel count threshold as "value,count"
        #[arg(long, value_name = "V,N")]
        count_larger_than: Option<String>,
        /// Pixel fraction threshold as "value,fraction"
        #[arg(long, value_name = "V,F")]
        percentage_larger_than: Option<String>,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Delete legacy 1x1 placeholder rasters
    Clean {
        /// Directory to scan recursively
        input_dir: PathBuf,
        /// Report what would be removed without deleting
        #[arg(long)]
        dry_run: bool,
    },
    /// Extract no-data masks into a mirrored directory tree
    Mask {
        /// Directory of input rasters
        input_dir: PathBuf,
        /// Destination root for the masks
        output_dir: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn raster_paths(root: &PathBuf) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension() == Some(OsStr::new("tif")))
        .map(|e| e.into_path())
        .collect()
}

fn parse_pair(s: &str, name: &str) -> Result<(f64, f64)> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 2 {
        anyhow::bail!("{} must be 'value,threshold', got: {}", name, s);
    }
    let value: f64 = parts[0].trim().parse().context("Invalid value")?;
    let threshold: f64 = parts[1].trim().parse().context("Invalid threshold")?;
    Ok((value, threshold))
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        // ── Run ──────────────────────────────────────────────────────
        Commands::Run { config, threads } => {
            let mut config =
                RunConfig::from_yaml_file(&config).context("Failed to load configuration")?;
            if let Some(threads) = threads {
                config.threads = threads;
            }

            let start = Instant::now();
            let summary = run(&config).context("Detection run failed")?;
            let elapsed = start.elapsed();

            println!(
                "{} / {} tiles changed ({} unmatched, {} target-only)",
                summary.changed, summary.total, summary.unmatched, summary.target_only
            );
            println!("Change list: {}", config.change_list.display());
            println!("  Processing time: {:.2?}", elapsed);
        }

        // ── Diff ─────────────────────────────────────────────────────
        Commands::Diff {
            reference,
            target,
            mean,
            maxima,
            sum,
            count_larger_than,
            percentage_larger_than,
        } => {
            let count_larger_than = count_larger_than
                .map(|s| parse_pair(&s, "count_larger_than"))
                .transpose()?
                .map(|(v, n)| (v, n as usize));
            let percentage_larger_than = percentage_larger_than
                .map(|s| parse_pair(&s, "percentage_larger_than"))
                .transpose()?;

            let metrics = MetricConfig {
                mean,
                maxima,
                sum,
                count_larger_than,
                percentage_larger_than,
            };
            if metrics.is_empty() {
                anyhow::bail!("At least one metric threshold is required");
            }

            match compare_single(&reference, &target, &metrics)
                .context("Failed to compare tiles")?
            {
                None => println!("No matching target: {}", target.display()),
                Some(verdict) => {
                    println!("{}", verdict);
                    println!("{}", if verdict.changed() { "Changed" } else { "Unchanged" });
                }
            }
        }

        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let pb = spinner("Reading raster...");
            let raster: Raster<f64> = read_geotiff(&input).context("Failed to read raster")?;
            pb.finish_and_clear();

            let (rows, cols) = raster.shape();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len() as f64
            );
        }

        // ── Clean ────────────────────────────────────────────────────
        Commands::Clean { input_dir, dry_run } => {
            let paths = raster_paths(&input_dir);
            let pb = ProgressBar::new(paths.len() as u64);
            let removed = AtomicUsize::new(0);

            paths.par_iter().for_each(|path| {
                match read_dimensions(path) {
                    Ok((1, 1)) => {
                        if dry_run {
                            info!("would remove: {}", path.display());
                            removed.fetch_add(1, Ordering::Relaxed);
                        } else if let Err(e) = std::fs::remove_file(path) {
                            warn!("cannot remove {}: {}", path.display(), e);
                        } else {
                            info!("removed: {}", path.display());
                            removed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!("cannot read {}: {}", path.display(), e),
                }
                pb.inc(1);
            });
            pb.finish_and_clear();

            println!(
                "{} placeholder raster(s) {} out of {} scanned",
                removed.load(Ordering::Relaxed),
                if dry_run { "found" } else { "removed" },
                paths.len()
            );
        }

        // ── Mask ─────────────────────────────────────────────────────
        Commands::Mask {
            input_dir,
            output_dir,
        } => {
            let paths = raster_paths(&input_dir);
            let pb = ProgressBar::new(paths.len() as u64);
            let written = AtomicUsize::new(0);

            paths.par_iter().for_each(|path| {
                if let Err(e) = extract_mask(path, &input_dir, &output_dir, &written) {
                    warn!("cannot mask {}: {}", path.display(), e);
                }
                pb.inc(1);
            });
            pb.finish_and_clear();

            println!(
                "{} mask(s) written out of {} rasters scanned",
                written.load(Ordering::Relaxed),
                paths.len()
            );
        }
    }

    Ok(())
}

/// Write the no-data mask of one raster, mirrored under the output root.
///
/// Rasters without no-data pixels are skipped.
fn extract_mask(
    path: &PathBuf,
    input_dir: &PathBuf,
    output_dir: &PathBuf,
    written: &AtomicUsize,
) -> Result<()> {
    let raster: Raster<f64> = read_geotiff(path).context("read failed")?;
    let (has_nodata, mask) = raster.nodata_mask();
    if !has_nodata {
        return Ok(());
    }

    let relative = path.strip_prefix(input_dir).context("not under input dir")?;
    let destination = output_dir.join(relative);
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent).context("cannot create output dir")?;
    }

    let mask_raster = Raster::from_array(mask.mapv(|m| if m { 1u8 } else { 0u8 }));
    write_geotiff(&mask_raster, &destination).context("write failed")?;
    written.fetch_add(1, Ordering::Relaxed);
    Ok(())
}
