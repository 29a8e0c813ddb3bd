//! Content-addressed cache of pre-converted dex fragments.
//!
//! Converting an unchanged library to dex on every build is the single most
//! expensive avoidable step, so converted fragments are stored under the
//! BLAKE3 hash of the input's bytes. The cache directory outlives builds and
//! is shared by every build on the host; the conversion tool and the cache
//! directory are the two resources guarded by one process-wide lock so that
//! concurrent builds never race on entry creation.

use std::collections::HashMap;
use std::fs;
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::{TaskError, TaskResult};
use crate::hash::Hash32;

/// The bytecode-conversion step, injected so the cache never needs to know
/// how the conversion tool is framed (or, in tests, that one exists at all).
pub trait DexConverter {
    /// Convert `input` alone, writing the produced fragment(s) into
    /// `output_dir`.
    fn convert(&self, input: &Utf8Path, output_dir: &Utf8Path) -> TaskResult;
}

/// Guards the conversion subprocess and cache-entry creation across builds
/// running in the same process.
static CONVERSION_LOCK: Mutex<()> = Mutex::new(());

/// Acquire the shared conversion lock. Every invocation of the conversion
/// tool goes through this guard, whether it fills a cache entry or converts
/// build-local classes that never enter the cache.
pub(crate) fn conversion_guard() -> std::sync::MutexGuard<'static, ()> {
    CONVERSION_LOCK.lock().unwrap()
}

#[cfg(test)]
pub(crate) fn conversion_lock_is_held() -> bool {
    CONVERSION_LOCK.try_lock().is_err()
}

/// Cache mapping input-file content hashes to converted dex fragments.
///
/// The in-memory hash memoization is build-local (one `PredexCache` lives in
/// each `BuildContext`); only the directory on disk is shared.
#[derive(Debug)]
pub struct PredexCache {
    dir: Utf8PathBuf,
    memo: HashMap<Utf8PathBuf, Hash32>,
}

impl PredexCache {
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            memo: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Return the dex fragment for `input`, converting on first encounter.
    ///
    /// The content hash of a given path is computed at most once per build.
    /// On a cache hit no conversion runs. On a miss the converter writes into
    /// a staging directory and the single produced fragment is renamed into
    /// place, so a failed conversion leaves no entry behind.
    pub fn resolve(&mut self, input: &Utf8Path, converter: &dyn DexConverter) -> Result<Utf8PathBuf, TaskError> {
        let hash = match self.memo.get(input) {
            Some(hash) => *hash,
            None => {
                let hash = Hash32::hash_file(input)?;
                self.memo.insert(input.to_owned(), hash);
                hash
            }
        };

        let hex = hash.to_hex();
        let entry = self.dir.join(&hex).with_extension("dex");

        let _guard = conversion_guard();

        if entry.exists() {
            tracing::debug!(input = %input, entry = %entry, "pre-dex cache hit");
            return Ok(entry);
        }

        fs::create_dir_all(&self.dir)?;
        let staging = self.dir.join(format!(".staging-{hex}"));
        fs::create_dir_all(&staging)?;

        tracing::debug!(input = %input, "pre-dex cache miss, converting");
        let converted = converter.convert(input, &staging);

        let result = converted.and_then(|()| {
            let produced = single_fragment(&staging)?;
            fs::rename(produced, &entry)?;
            Ok(entry.clone())
        });

        let _ = fs::remove_dir_all(&staging);
        result
    }
}

/// The converter must produce exactly one fragment for a single library
/// input; anything else indicates a broken invocation.
fn single_fragment(staging: &Utf8Path) -> Result<Utf8PathBuf, TaskError> {
    let mut fragments = Vec::new();

    for entry in staging.read_dir_utf8()? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fragments.push(entry.into_path());
        }
    }

    match fragments.len() {
        1 => Ok(fragments.remove(0)),
        n => Err(TaskError::tool(
            "dex converter",
            format!("expected one fragment for a library input, found {n}"),
        )),
    }
}
