//! Placement of plugin sources into the install root.
//!
//! A source is either a plugin directory, copied as-is, or a zip archive that
//! is extracted into a scratch directory inside the install root and then
//! renamed into place. Either way an existing installation under the same
//! name is removed first.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use ignore::WalkBuilder;

use crate::plugin::error::{PluginError, PluginResult};

const LOCK_FILENAME: &str = ".lock";
const SCRATCH_PREFIX: &str = ".extract-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginSource {
    Directory(PathBuf),
    Archive(PathBuf),
}

impl PluginSource {
    pub fn classify(path: &Path) -> PluginResult<Self> {
        if !path.exists() {
            return Err(PluginError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }

        let path = path.canonicalize().map_err(PluginError::io(path))?;

        if path.is_file() && is_archive(&path) {
            return Ok(Self::Archive(path));
        }

        if path.is_dir() {
            return Ok(Self::Directory(path));
        }

        Err(PluginError::InvalidSource { path })
    }

    /// Name of the installed directory: the directory's own name, or the
    /// archive's file stem.
    pub fn install_name(&self) -> PluginResult<String> {
        let name = match self {
            Self::Directory(path) => path.file_name(),
            Self::Archive(path) => path.file_stem(),
        };

        name.map(|name| name.to_string_lossy().into_owned())
            .filter(|name| {
                !name.is_empty()
                    && name.as_str() != LOCK_FILENAME
                    && !name.starts_with(SCRATCH_PREFIX)
            })
            .ok_or_else(|| PluginError::InvalidSource {
                path: self.path().to_path_buf(),
            })
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Directory(path) | Self::Archive(path) => path,
        }
    }
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}

#[derive(Debug)]
pub struct PluginInstaller<'a> {
    install_dir: &'a Path,
}

impl<'a> PluginInstaller<'a> {
    pub fn new(install_dir: &'a Path) -> Self {
        Self { install_dir }
    }

    /// Place `source` into the install root and return the plugin directory.
    pub fn place(&self, source: &PluginSource) -> PluginResult<PathBuf> {
        let dest = self.install_dir.join(source.install_name()?);

        match source {
            PluginSource::Directory(src) => {
                remove_existing(&dest)?;
                copy_tree(src, &dest)?;
            }
            PluginSource::Archive(archive) => {
                let scratch = tempfile::Builder::new()
                    .prefix(SCRATCH_PREFIX)
                    .tempdir_in(self.install_dir)
                    .map_err(PluginError::io(self.install_dir))?;

                extract_zip(archive, scratch.path())?;
                let plugin_root = plugin_root_in(scratch.path())?;

                remove_existing(&dest)?;
                // Scratch lives inside the install root, so this is a rename on
                // one filesystem. The guard tolerates its directory being gone.
                fs::rename(&plugin_root, &dest).map_err(PluginError::io(&dest))?;
            }
        }

        tracing::debug!(source = ?source.path(), ?dest, "placed plugin");
        Ok(dest)
    }
}

fn remove_existing(dest: &Path) -> PluginResult<()> {
    if dest.is_dir() {
        tracing::info!(?dest, "replacing existing installation");
        fs::remove_dir_all(dest).map_err(PluginError::io(dest))?;
    } else if dest.exists() {
        fs::remove_file(dest).map_err(PluginError::io(dest))?;
    }
    Ok(())
}

fn extract_zip(archive: &Path, into: &Path) -> PluginResult<()> {
    let file = File::open(archive).map_err(PluginError::io(archive))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|source| PluginError::Archive {
        path: archive.to_path_buf(),
        source,
    })?;

    zip.extract(into).map_err(|source| PluginError::Archive {
        path: archive.to_path_buf(),
        source,
    })
}

/// An archive wrapping everything in one folder yields that folder; any other
/// layout yields the extraction root itself.
fn plugin_root_in(extracted: &Path) -> PluginResult<PathBuf> {
    let entries: Vec<PathBuf> = fs::read_dir(extracted)
        .map_err(PluginError::io(extracted))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .collect();

    match entries.as_slice() {
        [only] if only.is_dir() => Ok(only.clone()),
        _ => Ok(extracted.to_path_buf()),
    }
}

/// Recursively copy `src` to `dest`, including hidden and ignored files.
fn copy_tree(src: &Path, dest: &Path) -> PluginResult<()> {
    let walker = WalkBuilder::new(src)
        .standard_filters(false)
        .follow_links(false)
        .build();

    for entry in walker {
        let entry = entry.map_err(|err| PluginError::Io {
            path: src.to_path_buf(),
            source: err
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("walk error")),
        })?;

        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.map(|ft| ft.is_dir()).unwrap_or(false) {
            fs::create_dir_all(&target).map_err(PluginError::io(&target))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(PluginError::io(parent))?;
            }
            fs::copy(entry.path(), &target).map_err(PluginError::io(&target))?;
        }
    }

    Ok(())
}

/// Exclusive advisory lock on the install root, held while the install tree
/// is mutated. Released on drop.
#[derive(Debug)]
pub struct InstallLock {
    file: File,
}

impl InstallLock {
    pub fn acquire(install_dir: &Path) -> PluginResult<Self> {
        let lock_path = install_dir.join(LOCK_FILENAME);
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(PluginError::io(&lock_path))?;

        file.lock_exclusive().map_err(PluginError::io(&lock_path))?;
        Ok(Self { file })
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            tracing::warn!(error = %err, "failed to release install lock");
        }
    }
}
