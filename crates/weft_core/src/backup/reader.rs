//! Archive opening, root resolution, and member access
//!
//! Exports nest their members one level inside a named folder so a manual
//! unzip stays tidy. The reader therefore never assumes a fixed depth: it
//! locates `export-manifest.json` and treats that member's parent as the
//! logical root for every other lookup.

use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::backup::MANIFEST_FILE;
use crate::error::{CoreError, Result};

/// Byte source a zip archive can be read from
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// A re-openable archive byte source
///
/// Content streams are single-consumption, so verify and execute each open
/// the archive again from the same source.
pub trait ArchiveSource: Send + Sync {
    fn reader(&self) -> Result<Box<dyn ReadSeek>>;
}

impl ArchiveSource for PathBuf {
    fn reader(&self) -> Result<Box<dyn ReadSeek>> {
        let file = std::fs::File::open(self)
            .map_err(|e| CoreError::io(format!("opening {}", self.display()), e))?;
        Ok(Box::new(file))
    }
}

/// An archive held in memory, cheaply cloneable and re-openable
#[derive(Debug, Clone)]
pub struct ArchiveBytes(Arc<[u8]>);

impl From<Vec<u8>> for ArchiveBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }
}

impl ArchiveBytes {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| CoreError::io(format!("reading {}", path.display()), e))?;
        Ok(Self::from(bytes))
    }
}

impl ArchiveSource for ArchiveBytes {
    fn reader(&self) -> Result<Box<dyn ReadSeek>> {
        Ok(Box::new(Cursor::new(self.0.clone())))
    }
}

/// An opened export archive with a resolved logical root
pub struct Archive {
    zip: ZipArchive<Box<dyn ReadSeek>>,
    root: String,
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Archive {
    /// Open the container and resolve its logical root
    ///
    /// Fatal when the container cannot be parsed or holds no manifest.
    pub fn open(source: &dyn ArchiveSource) -> Result<Self> {
        let zip = ZipArchive::new(source.reader()?)
            .map_err(|cause| CoreError::ArchiveOpenFailed { cause })?;
        let root = resolve_root(&zip)?;
        Ok(Self { zip, root })
    }

    /// The manifest's parent directory, `""` or `"<folder>/"`
    pub fn root(&self) -> &str {
        &self.root
    }

    fn member_path(&self, relative: &str) -> String {
        format!("{}{relative}", self.root)
    }

    pub fn has_member(&self, relative: &str) -> bool {
        let path = self.member_path(relative);
        self.zip.index_for_name(&path).is_some()
    }

    /// Read a member's bytes; `Ok(None)` when the member does not exist
    pub fn read_optional_bytes(&mut self, relative: &str) -> Result<Option<Vec<u8>>> {
        let path = self.member_path(relative);
        match self.zip.by_name(&path) {
            Ok(mut member) => {
                let mut buf = Vec::with_capacity(member.size() as usize);
                if let Err(e) = member.read_to_end(&mut buf) {
                    return Err(CoreError::archive_entry_read(path, e));
                }
                Ok(Some(buf))
            }
            Err(ZipError::FileNotFound) => Ok(None),
            Err(e) => Err(CoreError::archive_entry_read(
                path,
                std::io::Error::other(e),
            )),
        }
    }

    pub fn read_bytes(&mut self, relative: &str) -> Result<Vec<u8>> {
        self.read_optional_bytes(relative)?
            .ok_or_else(|| CoreError::archive_entry_missing(self.member_path(relative)))
    }

    pub fn read_optional_json<T: DeserializeOwned>(&mut self, relative: &str) -> Result<Option<T>> {
        let Some(bytes) = self.read_optional_bytes(relative)? else {
            return Ok(None);
        };
        let path = self.member_path(relative);
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CoreError::malformed_record(path, e))
    }

    pub fn read_json<T: DeserializeOwned>(&mut self, relative: &str) -> Result<T> {
        self.read_optional_json(relative)?
            .ok_or_else(|| CoreError::archive_entry_missing(self.member_path(relative)))
    }

    /// Root-relative names of all file members under a directory
    pub fn member_names_under(&self, relative_dir: &str) -> Vec<String> {
        let prefix = self.member_path(&format!("{relative_dir}/"));
        self.zip
            .file_names()
            .filter(|name| name.starts_with(&prefix) && !name.ends_with('/'))
            .map(|name| name[self.root.len()..].to_string())
            .collect()
    }
}

fn depth(name: &str) -> usize {
    name.matches('/').count()
}

fn resolve_root(zip: &ZipArchive<Box<dyn ReadSeek>>) -> Result<String> {
    let mut manifest: Option<&str> = None;
    for name in zip.file_names() {
        let matches = name == MANIFEST_FILE || name.ends_with(&format!("/{MANIFEST_FILE}"));
        if matches && manifest.is_none_or(|best| depth(name) < depth(best)) {
            manifest = Some(name);
        }
    }
    manifest
        .map(|name| name[..name.len() - MANIFEST_FILE.len()].to_string())
        .ok_or(CoreError::ManifestNotFound)
}
