//! Package archive inspection
//!
//! Packages are gzip-compressed tar archives laid out as one directory per
//! asset:
//!
//! ```text
//! <guid>/asset       # asset payload
//! <guid>/asset.meta  # importer settings
//! <guid>/pathname    # single line: project-relative path of the asset
//! ```
//!
//! Inspection only reads `pathname` entries; asset payloads are skipped over
//! in the stream.

use flate2::read::GzDecoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, SyncError};

const PATHNAME_SUFFIX: &str = "pathname";
const PREFAB_EXTENSION: &str = ".prefab";

pub struct ArchiveInspector;

impl ArchiveInspector {
    /// Names of the prefabs a package declares, in archive order.
    ///
    /// `x/y/Foo.prefab` yields `Foo`. An archive without prefab entries
    /// yields an empty list.
    pub fn list_declared_prefabs(archive: &Path) -> Result<Vec<String>> {
        Ok(Self::scan_prefab_entries(archive)?
            .into_iter()
            .map(|entry| entry.name)
            .collect())
    }

    /// Write every declared prefab asset to `<prefab_dir>/<name>.prefab`.
    ///
    /// Makes two passes over the stream: the first maps asset directories to
    /// prefab names, the second copies the matching `asset` payloads.
    pub fn extract_declared_prefabs(archive: &Path, prefab_dir: &Path) -> Result<Vec<PathBuf>> {
        let declared = Self::scan_prefab_entries(archive)?;
        if declared.is_empty() {
            return Ok(Vec::new());
        }

        let by_dir: HashMap<&str, &str> = declared
            .iter()
            .map(|entry| (entry.asset_dir.as_str(), entry.name.as_str()))
            .collect();

        std::fs::create_dir_all(prefab_dir)?;

        let mut tar = open(archive)?;
        let mut written = Vec::new();
        for entry in tar.entries().map_err(archive_error)? {
            let mut entry = entry.map_err(archive_error)?;
            let entry_path = entry_path(&entry);
            let Some((dir, file)) = entry_path.rsplit_once('/') else {
                continue;
            };
            if file != "asset" {
                continue;
            }
            let Some(name) = by_dir.get(dir) else {
                continue;
            };

            let dest = prefab_dir.join(format!("{}{}", name, PREFAB_EXTENSION));
            let mut out = File::create(&dest)?;
            std::io::copy(&mut entry, &mut out)?;
            debug!(prefab = %name, dest = %dest.display(), "Extracted prefab");
            written.push(dest);
        }

        info!(
            archive = %archive.display(),
            count = written.len(),
            "Extracted declared prefabs"
        );
        Ok(written)
    }

    fn scan_prefab_entries(archive: &Path) -> Result<Vec<PrefabEntry>> {
        let mut tar = open(archive)?;
        let mut found = Vec::new();

        for entry in tar.entries().map_err(archive_error)? {
            let entry = entry.map_err(archive_error)?;
            let entry_path = entry_path(&entry);
            if !entry_path.ends_with(PATHNAME_SUFFIX) {
                continue;
            }

            let Some(asset_path) = first_line(entry)? else {
                continue;
            };
            let Some(name) = prefab_name(&asset_path) else {
                continue;
            };

            let asset_dir = entry_path
                .rsplit_once('/')
                .map(|(dir, _)| dir.to_string())
                .unwrap_or_default();
            debug!(asset_path = %asset_path, prefab = %name, "Found declared prefab");
            found.push(PrefabEntry { asset_dir, name });
        }

        Ok(found)
    }
}

struct PrefabEntry {
    /// Directory of the entry inside the archive (the asset guid)
    asset_dir: String,
    name: String,
}

fn open(archive: &Path) -> Result<tar::Archive<GzDecoder<File>>> {
    let file = File::open(archive).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            SyncError::ArchiveMissing(archive.display().to_string())
        }
        _ => SyncError::Io(format!("{}: {}", archive.display(), e)),
    })?;
    Ok(tar::Archive::new(GzDecoder::new(file)))
}

fn entry_path<R: Read>(entry: &tar::Entry<'_, R>) -> String {
    let raw = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
    raw.strip_prefix("./").map(str::to_string).unwrap_or(raw)
}

fn first_line<R: Read>(entry: R) -> Result<Option<String>> {
    let mut line = String::new();
    let read = BufReader::new(entry)
        .read_line(&mut line)
        .map_err(archive_error)?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// `Assets/Models/Chair.prefab` -> `Chair`
fn prefab_name(asset_path: &str) -> Option<String> {
    if !asset_path.ends_with(PREFAB_EXTENSION) {
        return None;
    }
    let file_name = asset_path.rsplit('/').next().unwrap_or(asset_path);
    let stem = file_name.split('.').next().unwrap_or(file_name);
    if stem.is_empty() {
        return None;
    }
    Some(stem.to_string())
}

fn archive_error(e: std::io::Error) -> SyncError {
    SyncError::Archive(e.to_string())
}
