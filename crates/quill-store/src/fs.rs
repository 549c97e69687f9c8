use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use quill_pack::PackedObject;
use quill_types::Hash;
use tempfile::NamedTempFile;
use tracing::{debug, trace};

use crate::error::{StoreError, StoreResult};
use crate::traits::{verify, ListableObjectStore, ObjectStore};

/// Filesystem object store.
///
/// Each payload is zlib-compressed into
/// `<base>/<hash[0:2]>/<hash[2:4]>/<hash[4:]>` (digest bytes, hex-encoded),
/// so no directory grows past 65536 entries. Writes go to a temporary file in
/// the target directory and are renamed into place, so readers never observe
/// a partial object.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    base: PathBuf,
}

impl FsObjectStore {
    /// Open (creating if needed) a store rooted at `base`.
    pub fn open(base: impl Into<PathBuf>) -> StoreResult<Self> {
        let base = base.into();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn object_path(&self, hash: &Hash) -> PathBuf {
        self.base.join(hash.to_path_name())
    }
}

impl ObjectStore for FsObjectStore {
    fn write_packed(&self, object: &PackedObject) -> StoreResult<usize> {
        let path = self.object_path(object.hash());
        if path.exists() {
            trace!(hash = %object.hash(), "object already stored");
            return Ok(0);
        }
        let dir = path
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "object path has no parent"))?;
        fs::create_dir_all(dir)?;

        let tmp = NamedTempFile::new_in(dir)?;
        let mut encoder = ZlibEncoder::new(tmp, Compression::default());
        encoder.write_all(object.payload())?;
        let tmp = encoder.finish()?;
        tmp.as_file().sync_all()?;
        if !persist_new(tmp, &path)? {
            trace!(hash = %object.hash(), "object stored concurrently");
            return Ok(0);
        }

        debug!(hash = %object.hash(), bytes = object.len(), "wrote object");
        Ok(object.len())
    }

    fn retrieve_packed(&self, hash: &Hash) -> StoreResult<PackedObject> {
        let file = match fs::File::open(self.object_path(hash)) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(*hash))
            }
            Err(e) => return Err(e.into()),
        };
        let mut payload = Vec::new();
        ZlibDecoder::new(file).read_to_end(&mut payload)?;
        verify(hash, payload)
    }

    fn exists(&self, hash: &Hash) -> StoreResult<bool> {
        Ok(self.object_path(hash).is_file())
    }
}

impl ListableObjectStore for FsObjectStore {
    fn list_hashes(&self) -> StoreResult<Vec<Hash>> {
        let mut hashes = Vec::new();
        for first in read_dirs(&self.base)? {
            for second in read_dirs(&first)? {
                for entry in fs::read_dir(&second)? {
                    let entry = entry?;
                    if !entry.file_type()?.is_file() {
                        continue;
                    }
                    let hex = format!(
                        "{}{}{}",
                        file_name(&first),
                        file_name(&second),
                        entry.file_name().to_string_lossy()
                    );
                    match format!("sha256:{hex}").parse::<Hash>() {
                        Ok(hash) => hashes.push(hash),
                        // Leftover temporary files from interrupted writes.
                        Err(_) => trace!(path = %entry.path().display(), "skipping non-object file"),
                    }
                }
            }
        }
        hashes.sort();
        Ok(hashes)
    }
}

/// Move `tmp` to `path` unless something already lives there. Returns
/// whether this call created the object.
fn persist_new(tmp: NamedTempFile, path: &Path) -> StoreResult<bool> {
    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(StoreError::Io(e.error)),
    }
}

fn read_dirs(dir: &Path) -> StoreResult<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
