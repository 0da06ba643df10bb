//! On-disk layout of a persisted index.
//!
//! A base path `P` maps to two artifacts that are always written and read
//! together:
//!
//! - `P.vectors`: binary header followed by little-endian `f32` values in
//!   ordinal order.
//! - `P.documents.json`: JSON array of `{id, text, metadata}` objects in
//!   insertion order.
//!
//! Each artifact is written to a temporary sibling and renamed into place.
//! Saves and loads of the same base path are serialized through a
//! process-wide lock table.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};

use tracing::warn;
use uuid::Uuid;

use sema_core::error::{Result, SemaError};

const MAGIC: &[u8; 8] = b"SEMAVEC\0";
const FORMAT_VERSION: u32 = 1;
/// magic (8) + version (4) + dimension (4) + count (8)
const HEADER_SIZE: usize = 24;

const VECTORS_SUFFIX: &str = ".vectors";
const DOCUMENTS_SUFFIX: &str = ".documents.json";

static PATH_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// The pair of artifact paths derived from one base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub base: PathBuf,
    pub vectors: PathBuf,
    pub documents: PathBuf,
}

impl ArtifactPaths {
    pub fn new(base: &Path) -> Self {
        Self {
            base: base.to_path_buf(),
            vectors: with_suffix(base, VECTORS_SUFFIX),
            documents: with_suffix(base, DOCUMENTS_SUFFIX),
        }
    }

    /// True if at least one artifact is present.
    pub fn any_exists(&self) -> bool {
        self.vectors.exists() || self.documents.exists()
    }

    /// Fail with `IndexNotFound` naming the first missing artifact.
    pub fn ensure_exist(&self) -> Result<()> {
        for path in [&self.vectors, &self.documents] {
            if !path.is_file() {
                return Err(SemaError::IndexNotFound { path: path.clone() });
            }
        }
        Ok(())
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Lock guarding all artifact IO for one base path.
///
/// Entries no caller holds any more are pruned on each lookup, so the table
/// only keeps paths with IO in flight.
pub(crate) fn path_lock(base: &Path) -> Arc<Mutex<()>> {
    let key = std::path::absolute(base).unwrap_or_else(|_| base.to_path_buf());
    let mut locks = PATH_LOCKS.lock().unwrap_or_else(|e| e.into_inner());
    locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    Arc::clone(locks.entry(key).or_default())
}

/// Serialize `count` rows of `dimension` floats.
pub fn encode_vectors(dimension: usize, flat: &[f32]) -> Result<Vec<u8>> {
    let dim = u32::try_from(dimension)
        .map_err(|_| SemaError::InvalidArgument(format!("dimension {} too large", dimension)))?;
    let count = (flat.len() / dimension) as u64;

    let mut buf = Vec::with_capacity(HEADER_SIZE + flat.len() * 4);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&dim.to_le_bytes());
    buf.extend_from_slice(&count.to_le_bytes());
    for value in flat {
        buf.extend_from_slice(&value.to_le_bytes());
    }
    debug_assert_eq!(buf.len(), HEADER_SIZE + flat.len() * 4);
    Ok(buf)
}

/// Parse a vector artifact into its dimension and flat row data.
pub fn decode_vectors(input: &[u8]) -> Result<(usize, Vec<f32>)> {
    if input.len() < HEADER_SIZE {
        return Err(SemaError::CorruptIndex(format!(
            "vector artifact too short: {} bytes",
            input.len()
        )));
    }
    if &input[0..8] != MAGIC {
        return Err(SemaError::CorruptIndex("bad vector artifact magic".to_string()));
    }
    let version = u32::from_le_bytes(le_array(&input[8..12]));
    if version != FORMAT_VERSION {
        return Err(SemaError::CorruptIndex(format!(
            "unsupported vector format version {}",
            version
        )));
    }
    let dimension = u32::from_le_bytes(le_array(&input[12..16])) as usize;
    let count = u64::from_le_bytes(le_array(&input[16..24]));
    if dimension == 0 {
        return Err(SemaError::CorruptIndex("stored dimension is 0".to_string()));
    }

    let body = &input[HEADER_SIZE..];
    let expected = usize::try_from(count)
        .ok()
        .and_then(|c| c.checked_mul(dimension))
        .and_then(|n| n.checked_mul(4));
    if expected != Some(body.len()) {
        return Err(SemaError::CorruptIndex(format!(
            "vector artifact holds {} bytes of data, header claims {} x {}",
            body.len(),
            count,
            dimension
        )));
    }

    let flat = body
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(le_array(chunk)))
        .collect();
    Ok((dimension, flat))
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

/// One file being replaced by [`write_all_atomic`].
struct StagedFile<'a> {
    target: &'a Path,
    tmp: PathBuf,
    backup: Option<PathBuf>,
    committed: bool,
}

/// Replace every target with its bytes, or leave all of them as they were.
///
/// All contents are first written and synced to temporary siblings. Only then
/// is each existing target moved aside and the temporary renamed over it. Any
/// failure undoes the renames already made and restores the moved-aside files.
pub fn write_all_atomic(files: &[(&Path, &[u8])]) -> Result<()> {
    let mut staged = Vec::with_capacity(files.len());
    for &(target, bytes) in files {
        let tmp = with_suffix(target, &format!(".tmp-{}", Uuid::new_v4().simple()));
        let written = write_synced(&tmp, bytes);
        staged.push(StagedFile {
            target,
            tmp,
            backup: None,
            committed: false,
        });
        if let Err(e) = written {
            rollback(&staged);
            return Err(e.into());
        }
    }

    for i in 0..staged.len() {
        if let Err(e) = commit(&mut staged[i]) {
            warn!(path = %staged[i].target.display(), error = %e, "Artifact rename failed, rolling back");
            rollback(&staged);
            return Err(e.into());
        }
    }

    for file in &staged {
        if let Some(backup) = &file.backup {
            let _ = fs::remove_file(backup);
        }
    }
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn commit(file: &mut StagedFile<'_>) -> std::io::Result<()> {
    if file.target.is_file() {
        let backup = with_suffix(file.target, &format!(".bak-{}", Uuid::new_v4().simple()));
        fs::rename(file.target, &backup)?;
        file.backup = Some(backup);
    }
    fs::rename(&file.tmp, file.target)?;
    file.committed = true;
    Ok(())
}

fn rollback(staged: &[StagedFile<'_>]) {
    for file in staged.iter().rev() {
        if file.committed {
            let _ = fs::remove_file(file.target);
        } else {
            let _ = fs::remove_file(&file.tmp);
        }
        if let Some(backup) = &file.backup {
            let _ = fs::rename(backup, file.target);
        }
    }
}
