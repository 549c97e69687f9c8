//! Filesystem reference store.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{RefError, Result};
use crate::names::validate_ref_name;
use crate::traits::RefStore;
use crate::types::RefTarget;

/// Refs stored as small files under a base directory.
///
/// `refs/heads/main` lives at `<base>/refs/heads/main` and contains either
/// `algo:hex` or `ref: <target-name>`. Files are replaced atomically via a
/// temporary file and rename.
#[derive(Debug)]
pub struct FsRefStore {
    base: PathBuf,
    // Serializes read-compare-write so the changed flag is accurate.
    write_lock: Mutex<()>,
}

impl FsRefStore {
    /// Open (creating if needed) a ref store rooted at `base`.
    pub fn open(base: impl Into<PathBuf>) -> Result<Self> {
        let base = base.into();
        fs::create_dir_all(&base)?;
        Ok(Self {
            base,
            write_lock: Mutex::new(()),
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn ref_path(&self, name: &str) -> Result<PathBuf> {
        validate_ref_name(name)?;
        Ok(self.base.join(name))
    }

    fn read_file(&self, name: &str, path: &Path) -> Result<Option<RefTarget>> {
        match fs::read_to_string(path) {
            Ok(contents) => RefTarget::parse(name, &contents).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn collect(&self, dir: &Path, prefix: &str, out: &mut Vec<(String, RefTarget)>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(&self.base) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            // Temporary files from in-flight writes are dot-prefixed.
            if validate_ref_name(&name).is_err() {
                continue;
            }
            if entry.file_type()?.is_dir() {
                self.collect(&path, prefix, out)?;
            } else if name.starts_with(prefix) {
                if let Some(target) = self.read_file(&name, &path)? {
                    out.push((name, target));
                }
            }
        }
        Ok(())
    }
}

impl RefStore for FsRefStore {
    fn read_target(&self, name: &str) -> Result<Option<RefTarget>> {
        let path = self.ref_path(name)?;
        self.read_file(name, &path)
    }

    fn write_target(&self, name: &str, target: &RefTarget) -> Result<bool> {
        let path = self.ref_path(name)?;
        let _guard = self.write_lock.lock().map_err(|_| RefError::LockPoisoned)?;

        if self.read_file(name, &path)?.as_ref() == Some(target) {
            return Ok(false);
        }
        let dir = path.parent().unwrap_or(self.base.as_path());
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(target.to_string().as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| RefError::Io(e.error))?;

        debug!(name, target = %target, "ref updated");
        Ok(true)
    }

    fn delete_ref(&self, name: &str) -> Result<bool> {
        let path = self.ref_path(name)?;
        let _guard = self.write_lock.lock().map_err(|_| RefError::LockPoisoned)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, RefTarget)>> {
        let mut refs = Vec::new();
        self.collect(&self.base, prefix, &mut refs)?;
        refs.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(refs)
    }
}
