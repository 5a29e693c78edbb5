//! Artifact archiving
//!
//! Copies the reference/target pair of a changed tile into an inspection
//! tree that mirrors the source layout. Copy failures are logged and
//! swallowed; they never affect the tile's verdict or the run.

use crate::config::RunConfig;
use crate::tiles::{POINTCLOUD_EXT, RASTER_EXT};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::error;

/// Kind of artifact to archive for a changed tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Raster,
    PointCloud,
}

/// Copies changed tile pairs into the inspection directory tree
#[derive(Debug, Clone)]
pub struct Archiver {
    reference_dir: PathBuf,
    save_dir: Option<PathBuf>,
    reference_las_dir: Option<PathBuf>,
    target_las_dir: Option<PathBuf>,
    save_las_dir: Option<PathBuf>,
}

impl Archiver {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            reference_dir: config.reference_dir.clone(),
            save_dir: config.save_dir.clone(),
            reference_las_dir: config.reference_las_dir.clone(),
            target_las_dir: config.target_las_dir.clone(),
            save_las_dir: config.save_las_dir.clone(),
        }
    }

    /// Archive the reference/target pair of one changed tile.
    ///
    /// `reference` and `target` are the raster paths of the pair; for
    /// `ArtifactKind::PointCloud` the sources are re-rooted under the las
    /// directories with the `las` extension.
    pub fn archive(&self, reference: &Path, target: &Path, kind: ArtifactKind) {
        let relative = match reference.strip_prefix(&self.reference_dir) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => {
                error!(
                    "cannot archive {}: not under the reference root",
                    reference.display()
                );
                return;
            }
        };

        let (source_reference, source_target, destination_root, ext) = match kind {
            ArtifactKind::Raster => {
                let Some(save_dir) = &self.save_dir else {
                    error!("raster archive root not configured");
                    return;
                };
                (
                    reference.to_path_buf(),
                    target.to_path_buf(),
                    save_dir.clone(),
                    RASTER_EXT,
                )
            }
            ArtifactKind::PointCloud => {
                let (Some(reference_las), Some(target_las), Some(save_las)) = (
                    &self.reference_las_dir,
                    &self.target_las_dir,
                    &self.save_las_dir,
                ) else {
                    error!("point-cloud archive roots not configured");
                    return;
                };
                (
                    reference_las.join(&relative).with_extension(POINTCLOUD_EXT),
                    target_las.join(&relative).with_extension(POINTCLOUD_EXT),
                    save_las.clone(),
                    POINTCLOUD_EXT,
                )
            }
        };

        let destination = destination_root.join(&relative);
        let destination_reference = destination.with_extension(format!("reference.{}", ext));
        let destination_target = destination.with_extension(format!("target.{}", ext));

        if let Some(parent) = destination_reference.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("cannot create {}: {}", parent.display(), e);
                return;
            }
        }

        copy_logged(&source_reference, &destination_reference);
        copy_logged(&source_target, &destination_target);
    }
}

fn copy_logged(source: &Path, destination: &Path) {
    if let Err(e) = fs::copy(source, destination) {
        error!(
            "archive copy {} -> {} failed: {}",
            source.display(),
            destination.display(),
            e
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricConfig;
    use std::fs;
    use tempfile::TempDir;

    fn config_with_roots(
        reference_dir: &Path,
        save_dir: &Path,
        las: Option<(&Path, &Path, &Path)>,
    ) -> RunConfig {
        RunConfig {
            reference_dir: reference_dir.to_path_buf(),
            target_dir: PathBuf::from("/unused"),
            metrics: MetricConfig::default(),
            save_dir: Some(save_dir.to_path_buf()),
            reference_las_dir: las.map(|(r, _, _)| r.to_path_buf()),
            target_las_dir: las.map(|(_, t, _)| t.to_path_buf()),
            save_las_dir: las.map(|(_, _, s)| s.to_path_buf()),
            copy_tif: true,
            copy_las: las.is_some(),
            threads: 0,
            change_list: PathBuf::from("changed.txt"),
        }
    }

    #[test]
    fn test_raster_pair_is_mirrored() {
        let reference_root = TempDir::new().unwrap();
        let target_root = TempDir::new().unwrap();
        let save_root = TempDir::new().unwrap();

        let reference = reference_root.path().join("10/0042.tif");
        let target = target_root.path().join("10/0042.tif");
        fs::create_dir_all(reference.parent().unwrap()).unwrap();
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&reference, b"ref").unwrap();
        fs::write(&target, b"tgt").unwrap();

        let config = config_with_roots(reference_root.path(), save_root.path(), None);
        let archiver = Archiver::from_config(&config);
        archiver.archive(&reference, &target, ArtifactKind::Raster);

        let copied_reference = save_root.path().join("10/0042.reference.tif");
        let copied_target = save_root.path().join("10/0042.target.tif");
        assert_eq!(fs::read(copied_reference).unwrap(), b"ref");
        assert_eq!(fs::read(copied_target).unwrap(), b"tgt");
    }

    #[test]
    fn test_pointcloud_sources_are_rerooted() {
        let reference_root = TempDir::new().unwrap();
        let target_root = TempDir::new().unwrap();
        let save_root = TempDir::new().unwrap();
        let reference_las = TempDir::new().unwrap();
        let target_las = TempDir::new().unwrap();
        let save_las = TempDir::new().unwrap();

        let reference = reference_root.path().join("7/0001.tif");
        let target = target_root.path().join("7/0001.tif");

        let las_a = reference_las.path().join("7/0001.las");
        let las_b = target_las.path().join("7/0001.las");
        fs::create_dir_all(las_a.parent().unwrap()).unwrap();
        fs::create_dir_all(las_b.parent().unwrap()).unwrap();
        fs::write(&las_a, b"cloud-a").unwrap();
        fs::write(&las_b, b"cloud-b").unwrap();

        let config = config_with_roots(
            reference_root.path(),
            save_root.path(),
            Some((reference_las.path(), target_las.path(), save_las.path())),
        );
        let archiver = Archiver::from_config(&config);
        archiver.archive(&reference, &target, ArtifactKind::PointCloud);

        assert_eq!(
            fs::read(save_las.path().join("7/0001.reference.las")).unwrap(),
            b"cloud-a"
        );
        assert_eq!(
            fs::read(save_las.path().join("7/0001.target.las")).unwrap(),
            b"cloud-b"
        );
    }

    #[test]
    fn test_copy_failure_does_not_panic_or_propagate() {
        let reference_root = TempDir::new().unwrap();
        let save_root = TempDir::new().unwrap();

        // sources never created on disk
        let reference = reference_root.path().join("3/0005.tif");
        let target = PathBuf::from("/nonexistent/3/0005.tif");

        let config = config_with_roots(reference_root.path(), save_root.path(), None);
        let archiver = Archiver::from_config(&config);
        archiver.archive(&reference, &target, ArtifactKind::Raster);
    }
}
