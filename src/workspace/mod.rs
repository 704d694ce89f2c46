//! EN-012: Workspace staging: isolated module copies and the scoped provider file.
//!
//! An isolated workspace is a temporary copy of the module directory, so
//! concurrent invocations never share a provider file or tool state. The
//! provider file is a guard: created on `stage`, removed when dropped.

use crate::core::error::{Error, Result};
use crate::core::types::ProviderFileSpec;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::{DirEntry, WalkDir};

/// Directory the provisioning tool keeps plugins and modules in.
const TOOL_DIR: &str = ".terraform";

/// Entries that belong to a previous run rather than to the module source.
pub fn is_transient(name: &str) -> bool {
    name == TOOL_DIR || name.contains(".tfstate")
}

/// Directory one invocation runs in.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    isolated: bool,
    // Dropped last: removes the copy.
    _temp: Option<TempDir>,
}

impl Workspace {
    /// Copy `module_dir` into a fresh temporary directory.
    pub fn isolated(module_dir: &Path) -> Result<Self> {
        if !module_dir.is_dir() {
            return Err(Error::Workspace(format!(
                "module directory {} does not exist",
                module_dir.display()
            )));
        }
        let temp = tempfile::Builder::new()
            .prefix("ensayo-")
            .tempdir()
            .map_err(|e| Error::Workspace(format!("cannot create temporary workspace: {}", e)))?;
        let copied = copy_module(module_dir, temp.path())?;
        log::debug!(
            "staged {} ({} files) in {}",
            module_dir.display(),
            copied,
            temp.path().display()
        );
        Ok(Self {
            root: temp.path().to_path_buf(),
            isolated: true,
            _temp: Some(temp),
        })
    }

    /// Run directly in `module_dir`.
    pub fn in_place(module_dir: &Path) -> Result<Self> {
        if !module_dir.is_dir() {
            return Err(Error::Workspace(format!(
                "module directory {} does not exist",
                module_dir.display()
            )));
        }
        Ok(Self {
            root: module_dir.to_path_buf(),
            isolated: false,
            _temp: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Stage the provider file in this workspace.
    ///
    /// An isolated copy may hold a stale provider file from the source; it is
    /// replaced. In place, an existing file belongs to the user and is left alone.
    pub fn stage_provider_file(&self, spec: &ProviderFileSpec) -> Result<ProviderFile> {
        let path = self.root.join(&spec.name);
        if path.exists() {
            if !self.isolated {
                return Err(Error::Workspace(format!(
                    "{} already exists; refusing to overwrite it in place",
                    path.display()
                )));
            }
            log::warn!("replacing {} in the isolated copy", spec.name);
        }
        ProviderFile::create(path, &spec.content)
    }
}

/// Walk module sources in file-name order, following symlinks and skipping
/// transient tool state. Symlink loops and dangling links are skipped with a
/// warning.
pub(crate) fn walk_module(root: &Path) -> Result<Vec<DirEntry>> {
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_transient(&e.file_name().to_string_lossy()));

    let mut entries = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) => entries.push(entry),
            Err(e) if e.loop_ancestor().is_some() => {
                log::warn!("skipping symlink loop: {}", e);
            }
            Err(e) if e.depth() > 0 && is_not_found(&e) => {
                log::warn!("skipping dangling link: {}", e);
            }
            Err(e) => {
                return Err(Error::Workspace(format!(
                    "cannot walk {}: {}",
                    root.display(),
                    e
                )))
            }
        }
    }
    Ok(entries)
}

fn is_not_found(e: &walkdir::Error) -> bool {
    e.io_error()
        .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
}

/// Copy module sources, skipping transient tool state. Symlinked files and
/// directories are copied as their targets. Returns the file count.
fn copy_module(source: &Path, dest: &Path) -> Result<usize> {
    let mut files = 0;
    for entry in walk_module(source)? {
        let rel = match entry.path().strip_prefix(source) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => continue,
        };
        let target = dest.join(rel);
        let ft = entry.file_type();
        if ft.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| {
                Error::Workspace(format!("cannot create {}: {}", target.display(), e))
            })?;
        } else if ft.is_file() {
            std::fs::copy(entry.path(), &target).map_err(|e| {
                Error::Workspace(format!("cannot copy {}: {}", entry.path().display(), e))
            })?;
            files += 1;
        } else {
            log::debug!("skipping non-regular entry {}", entry.path().display());
        }
    }
    Ok(files)
}

/// Provider file present for the lifetime of the guard.
#[derive(Debug)]
pub struct ProviderFile {
    path: PathBuf,
}

impl ProviderFile {
    fn create(path: PathBuf, content: &str) -> Result<Self> {
        std::fs::write(&path, content)
            .map_err(|e| Error::Workspace(format!("cannot write {}: {}", path.display(), e)))?;
        log::debug!("wrote {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProviderFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("removed {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("cannot remove {}: {}", self.path.display(), e),
        }
    }
}
