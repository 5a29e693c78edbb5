//! Parallel dispatch and result aggregation
//!
//! Fans the tile-pair list out over a bounded worker pool and merges the
//! outcomes in whatever order they complete. Workers share only read-only
//! state; the change list is written by the single aggregating thread.

use crate::archive::{Archiver, ArtifactKind};
use crate::classify::{classify, ChangeVerdict};
use crate::config::{MetricConfig, RunConfig};
use crate::diff::difference;
use crate::tiles::{pair_tiles, target_only_stems, TilePair};
use crossbeam_channel::Receiver;
use demdelta_core::{Error, Result};
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Terminal outcome of one tile comparison
#[derive(Debug, Clone)]
pub enum TileOutcome {
    /// The target tile does not exist
    Unmatched { stem: String },
    /// No configured metric fired
    Unchanged { stem: String },
    /// At least one configured metric fired
    Changed { stem: String, verdict: ChangeVerdict },
}

/// Run-level counters and the change list
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Number of tile pairs considered
    pub total: usize,
    /// Changed tiles, including target-only tiles
    pub changed: usize,
    /// Pairs whose target tile was absent
    pub unmatched: usize,
    /// Tiles present only in the target epoch
    pub target_only: usize,
    /// Every stem written to the change list, in aggregation order
    pub changed_stems: Vec<String>,
}

/// One comparison task: difference, classify, archive on a positive verdict.
///
/// Shared read-only across all workers.
struct TileComparator<'a> {
    config: &'a RunConfig,
    archiver: Archiver,
}

impl TileComparator<'_> {
    fn compare(&self, pair: &TilePair) -> Result<TileOutcome> {
        let diff = difference(&pair.reference, &pair.target)?;
        let stem = pair.stem();

        match classify(&diff, &self.config.metrics) {
            None => Ok(TileOutcome::Unmatched { stem }),
            Some(verdict) if verdict.changed() => {
                if self.config.copy_tif {
                    self.archiver
                        .archive(&pair.reference, &pair.target, ArtifactKind::Raster);
                }
                if self.config.copy_las {
                    self.archiver
                        .archive(&pair.reference, &pair.target, ArtifactKind::PointCloud);
                }
                Ok(TileOutcome::Changed { stem, verdict })
            }
            Some(_) => Ok(TileOutcome::Unchanged { stem }),
        }
    }
}

/// Compare every tile pair under the configured roots.
///
/// Outcomes are aggregated commutatively, so worker completion order never
/// affects the summary. The first fatal task error (unreadable raster,
/// dimension mismatch) aborts the run after the in-flight tasks drain.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    config.validate()?;

    let pairs = pair_tiles(&config.reference_dir, &config.target_dir)?;
    let target_only = target_only_stems(&config.target_dir, &pairs)?;
    let total = pairs.len();

    // num_threads(0) falls through to one worker per core
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .map_err(|e| Error::Other(e.to_string()))?;

    let comparator = TileComparator {
        config,
        archiver: Archiver::from_config(config),
    };

    let (tx, rx) = crossbeam_channel::unbounded();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            pool.install(|| {
                pairs.par_iter().for_each_with(tx, |tx, pair| {
                    // the aggregator may already have bailed out
                    let _ = tx.send(comparator.compare(pair));
                });
            });
        });

        aggregate(rx, total, &target_only, config)
    })
}

fn aggregate(
    rx: Receiver<Result<TileOutcome>>,
    total: usize,
    target_only: &[String],
    config: &RunConfig,
) -> Result<RunSummary> {
    let file = File::create(&config.change_list)?;
    let mut writer = BufWriter::new(file);

    let progress = ProgressBar::new(total as u64);
    let mut changed = 0usize;
    let mut unmatched = 0usize;
    let mut changed_stems = Vec::new();
    let mut fatal: Option<Error> = None;

    for result in rx {
        progress.inc(1);
        match result {
            Ok(TileOutcome::Unmatched { stem }) => {
                warn!("non-existing target: {}", stem);
                unmatched += 1;
            }
            Ok(TileOutcome::Changed { stem, verdict }) => {
                debug!("changed {}: {}", verdict, stem);
                write_stem(&mut writer, &stem)?;
                changed += 1;
                changed_stems.push(stem);
            }
            Ok(TileOutcome::Unchanged { stem }) => {
                debug!("unchanged: {}", stem);
            }
            Err(e) => {
                if fatal.is_none() {
                    fatal = Some(e);
                }
            }
        }
    }
    progress.finish_and_clear();

    if let Some(e) = fatal {
        return Err(e);
    }

    // buildings that only exist since the target epoch
    info!("new buildings: {}", target_only.len());
    for stem in target_only {
        debug!("changed (new): {}", stem);
        write_stem(&mut writer, stem)?;
        changed += 1;
        changed_stems.push(stem.clone());
    }
    writer.flush()?;

    info!("{} / {} tiles changed", changed, total);

    Ok(RunSummary {
        total,
        changed,
        unmatched,
        target_only: target_only.len(),
        changed_stems,
    })
}

fn write_stem(writer: &mut BufWriter<File>, stem: &str) -> Result<()> {
    writeln!(writer, "{}", stem)?;
    Ok(())
}

/// Compare one pair outside the pool, for ad-hoc inspection.
pub fn compare_single(
    reference: &Path,
    target: &Path,
    metrics: &MetricConfig,
) -> Result<Option<ChangeVerdict>> {
    let diff = difference(reference, target)?;
    Ok(classify(&diff, metrics))
}
