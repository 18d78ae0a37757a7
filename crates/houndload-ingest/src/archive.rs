//! Collector archives
//!
//! Collectors ship their JSON files in one zip. [`expand`] walks the entries in
//! order and extracts each into the scratch directory only when the caller asks
//! for it, so at most one extracted file exists at a time. Entry names come
//! from the archive and are untrusted: they are reduced to a bare file name
//! before touching the filesystem.

use houndload_common::{HoundError, Result};
use regex::Regex;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};
use zip::ZipArchive;

const MAX_FILE_NAME_BYTES: usize = 255;

static ILLEGAL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[/?<>\\:*|"\x00-\x1f\x80-\x9f]"#).expect("valid pattern"));
static RESERVED_NAMES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(con|prn|aux|nul|com[0-9]|lpt[0-9])(\..*)?$").expect("valid pattern")
});

/// Create the scratch directory if it does not exist yet
pub fn prepare_scratch_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Reduce an archive entry name to a file name safe to join onto the scratch
/// directory
///
/// Path separators, reserved characters and control characters are removed,
/// dot-only names and device names are dropped, and the result is capped at
/// 255 bytes. Names with nothing left fall back to `entry-<index>.json`.
pub fn sanitize_entry_name(name: &str, index: usize) -> String {
    let mut cleaned = ILLEGAL_CHARS.replace_all(name, "").into_owned();

    if cleaned.chars().all(|c| c == '.') || RESERVED_NAMES.is_match(&cleaned) {
        cleaned.clear();
    }
    let trimmed_len = cleaned.trim_end_matches(['.', ' ']).len();
    cleaned.truncate(trimmed_len);

    if cleaned.len() > MAX_FILE_NAME_BYTES {
        let mut cut = MAX_FILE_NAME_BYTES;
        while !cleaned.is_char_boundary(cut) {
            cut -= 1;
        }
        cleaned.truncate(cut);
    }

    if cleaned.is_empty() {
        format!("entry-{}.json", index)
    } else {
        cleaned
    }
}

/// Open `archive_path` and prepare to extract its entries into `scratch_dir`
pub fn expand(archive_path: &Path, scratch_dir: &Path) -> Result<ArchiveEntries> {
    prepare_scratch_dir(scratch_dir)?;

    let file = File::open(archive_path)?;
    let archive = ZipArchive::new(BufReader::new(file))
        .map_err(|e| HoundError::Archive(format!("{}: {}", archive_path.display(), e)))?;
    debug!(path = %archive_path.display(), entries = archive.len(), "Opened archive");

    Ok(ArchiveEntries {
        archive,
        scratch_dir: scratch_dir.to_path_buf(),
        index: 0,
    })
}

/// Entries of an archive, extracted one per `next()` call
pub struct ArchiveEntries {
    archive: ZipArchive<BufReader<File>>,
    scratch_dir: PathBuf,
    index: usize,
}

impl ArchiveEntries {
    /// Number of entries, directories included
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    fn extract(&mut self, index: usize) -> Result<Option<ScratchFile>> {
        let mut entry = self
            .archive
            .by_index(index)
            .map_err(|e| HoundError::Archive(format!("entry {}: {}", index, e)))?;
        if entry.is_dir() {
            return Ok(None);
        }

        let name = sanitize_entry_name(entry.name(), index);
        let path = self.scratch_dir.join(&name);
        debug!(entry = entry.name(), path = %path.display(), "Extracting entry");

        // Guard first so a failed copy does not leave a partial file behind
        let scratch = ScratchFile::new(path);
        let mut out = File::create(scratch.path())?;
        std::io::copy(&mut entry, &mut out)?;
        out.sync_all()?;

        Ok(Some(scratch))
    }
}

impl Iterator for ArchiveEntries {
    type Item = Result<ScratchFile>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.archive.len() {
            let index = self.index;
            self.index += 1;
            match self.extract(index) {
                Ok(Some(file)) => return Some(Ok(file)),
                Ok(None) => continue,
                Err(e) => {
                    self.index = self.archive.len();
                    return Some(Err(e));
                },
            }
        }
        None
    }
}

/// An extracted file, deleted when dropped unless already removed
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    removed: bool,
}

impl ScratchFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file, reporting failure
    pub fn remove(mut self) -> Result<()> {
        self.removed = true;
        std::fs::remove_file(&self.path)?;
        Ok(())
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Could not remove scratch file");
            }
        }
    }
}
