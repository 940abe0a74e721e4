use async_trait::async_trait;
use std::{
    collections::VecDeque,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;

/// Errors from the entry layer. `NotAFile`/`NotADirectory` are caller
/// contract violations (wrong entry shape passed in) and are meant to fail
/// loudly, unlike the structural-absence cases the metadata parser reports
/// through diagnostics.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("{0} is not a file")]
    NotAFile(String),
    #[error("{0} is not a directory")]
    NotADirectory(String),
    #[error("read {path}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

pub type EntryRef = Arc<dyn FsEntry>;

/// A node in a directory-handle tree. Mirrors the browser
/// `FileSystemEntry` shape: an entry knows its name and kind, a file can be
/// read as text, and a directory hands out a pager over its children.
#[async_trait]
pub trait FsEntry: Send + Sync {
    fn name(&self) -> &str;
    fn is_file(&self) -> bool;
    fn is_dir(&self) -> bool;

    async fn read_text(&self) -> Result<String, EntryError>;

    /// Open a pager over the immediate children. Fails with
    /// `NotADirectory` when called on a file.
    async fn read_children(&self) -> Result<Box<dyn EntryPager>, EntryError>;
}

/// Paged reader over one directory's children. A source may return results
/// in batches of any size; exhaustion is signalled by an empty batch, not a
/// sentinel, so callers must drain until they see one.
#[async_trait]
pub trait EntryPager: Send {
    async fn next_page(&mut self) -> Result<Vec<EntryRef>, EntryError>;
}

impl std::fmt::Debug for dyn EntryPager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn EntryPager")
    }
}

/// Drain one directory completely (repeated paged reads until an empty
/// page). One level only; does not descend.
pub async fn read_dir_entries(dir: &EntryRef) -> Result<Vec<EntryRef>, EntryError> {
    let mut pager = dir.read_children().await?;
    let mut entries = Vec::new();
    loop {
        let page = pager.next_page().await?;
        if page.is_empty() {
            break;
        }
        entries.extend(page);
    }
    Ok(entries)
}

/// Recursively enumerate every file reachable from `roots`. Breadth
/// unordered: a work queue is seeded with the roots; files are collected,
/// directories are drained and their children enqueued. Order is the order
/// of discovery, deterministic per run for a deterministic source. Any
/// page-read failure fails the whole traversal.
pub async fn enumerate(roots: Vec<EntryRef>) -> Result<Vec<EntryRef>, EntryError> {
    let mut queue: VecDeque<EntryRef> = roots.into();
    let mut files = Vec::new();

    while let Some(entry) = queue.pop_front() {
        if entry.is_file() {
            files.push(entry);
        } else if entry.is_dir() {
            for child in read_dir_entries(&entry).await? {
                queue.push_back(child);
            }
        }
    }

    Ok(files)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiskKind {
    File,
    Dir,
    Other,
}

/// Entry source backed by the local filesystem via `tokio::fs`.
pub struct DiskEntry {
    path: PathBuf,
    name: String,
    kind: DiskKind,
}

impl DiskEntry {
    pub async fn open(path: &Path) -> Result<EntryRef, EntryError> {
        let meta = tokio::fs::metadata(path).await.map_err(|source| EntryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let kind = if meta.is_dir() {
            DiskKind::Dir
        } else if meta.is_file() {
            DiskKind::File
        } else {
            DiskKind::Other
        };
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Arc::new(DiskEntry {
            path: path.to_path_buf(),
            name,
            kind,
        }))
    }

    fn io_error(&self, source: io::Error) -> EntryError {
        EntryError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl FsEntry for DiskEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_file(&self) -> bool {
        self.kind == DiskKind::File
    }

    fn is_dir(&self) -> bool {
        self.kind == DiskKind::Dir
    }

    async fn read_text(&self) -> Result<String, EntryError> {
        if !self.is_file() {
            return Err(EntryError::NotAFile(self.name.clone()));
        }
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| self.io_error(source))
    }

    async fn read_children(&self) -> Result<Box<dyn EntryPager>, EntryError> {
        if !self.is_dir() {
            return Err(EntryError::NotADirectory(self.name.clone()));
        }
        let reader = tokio::fs::read_dir(&self.path)
            .await
            .map_err(|source| self.io_error(source))?;
        Ok(Box::new(DiskPager {
            dir: self.path.clone(),
            reader,
        }))
    }
}

const DISK_PAGE_SIZE: usize = 64;

struct DiskPager {
    dir: PathBuf,
    reader: tokio::fs::ReadDir,
}

#[async_trait]
impl EntryPager for DiskPager {
    async fn next_page(&mut self) -> Result<Vec<EntryRef>, EntryError> {
        let mut page: Vec<EntryRef> = Vec::new();
        while page.len() < DISK_PAGE_SIZE {
            let next = self.reader.next_entry().await.map_err(|source| EntryError::Io {
                path: self.dir.display().to_string(),
                source,
            })?;
            let Some(dirent) = next else {
                break;
            };
            let file_type = dirent.file_type().await.map_err(|source| EntryError::Io {
                path: dirent.path().display().to_string(),
                source,
            })?;
            let kind = if file_type.is_dir() {
                DiskKind::Dir
            } else if file_type.is_file() {
                DiskKind::File
            } else {
                DiskKind::Other
            };
            page.push(Arc::new(DiskEntry {
                path: dirent.path(),
                name: dirent.file_name().to_string_lossy().into_owned(),
                kind,
            }));
        }
        Ok(page)
    }
}
