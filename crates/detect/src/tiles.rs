//! Tile enumeration
//!
//! Reference and target roots mirror each other's relative-path layout;
//! a tile's identity is its relative path minus the extension.

use demdelta_core::{Error, Result};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extension of raster tiles
pub const RASTER_EXT: &str = "tif";

/// File extension of point-cloud tiles
pub const POINTCLOUD_EXT: &str = "las";

/// A reference tile and the path its target counterpart would have.
///
/// The target path is derived, not checked: a pair with an absent target
/// file is a normal "unmatched" case downstream.
#[derive(Debug, Clone)]
pub struct TilePair {
    pub reference: PathBuf,
    pub target: PathBuf,
}

impl TilePair {
    /// Tile stem reported in outcomes and the change list
    pub fn stem(&self) -> String {
        self.reference
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

fn raster_tiles(root: &Path) -> Result<Vec<PathBuf>> {
    let mut tiles = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Other(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension() == Some(OsStr::new(RASTER_EXT)) {
            tiles.push(entry.into_path());
        }
    }
    Ok(tiles)
}

/// Pair every reference tile with its target counterpart
pub fn pair_tiles(reference_root: &Path, target_root: &Path) -> Result<Vec<TilePair>> {
    let mut pairs = Vec::new();
    for reference in raster_tiles(reference_root)? {
        let relative = reference
            .strip_prefix(reference_root)
            .map_err(|e| Error::Other(e.to_string()))?;
        let target = target_root.join(relative).with_extension(RASTER_EXT);
        pairs.push(TilePair { reference, target });
    }
    Ok(pairs)
}

/// Stems of target tiles with no reference counterpart.
///
/// These are buildings that exist only in the newer epoch; they are
/// reported as changed without ever being differenced.
pub fn target_only_stems(target_root: &Path, pairs: &[TilePair]) -> Result<Vec<String>> {
    let matched: HashSet<&Path> = pairs.iter().map(|p| p.target.as_path()).collect();

    let mut stems = Vec::new();
    for target in raster_tiles(target_root)? {
        if !matched.contains(target.as_path()) {
            stems.push(
                target
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
        }
    }
    Ok(stems)
}
