//! In-memory entry source for tests: builds `FsEntry` trees without disk
//! and pages children in configurable batch sizes so the drain-until-empty
//! contract gets exercised.

use crate::entry::{EntryError, EntryPager, EntryRef, FsEntry};
use async_trait::async_trait;
use std::sync::Arc;

pub struct MemEntry {
    name: String,
    content: Option<String>,
    children: Option<Vec<EntryRef>>,
    page_size: usize,
}

pub fn file(name: &str, content: &str) -> EntryRef {
    Arc::new(MemEntry {
        name: name.to_string(),
        content: Some(content.to_string()),
        children: None,
        page_size: 0,
    })
}

pub fn dir(name: &str, children: Vec<EntryRef>) -> EntryRef {
    dir_paged(name, children, 2)
}

pub fn dir_paged(name: &str, children: Vec<EntryRef>, page_size: usize) -> EntryRef {
    Arc::new(MemEntry {
        name: name.to_string(),
        content: None,
        children: Some(children),
        page_size: page_size.max(1),
    })
}

#[async_trait]
impl FsEntry for MemEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_file(&self) -> bool {
        self.content.is_some()
    }

    fn is_dir(&self) -> bool {
        self.children.is_some()
    }

    async fn read_text(&self) -> Result<String, EntryError> {
        self.content
            .clone()
            .ok_or_else(|| EntryError::NotAFile(self.name.clone()))
    }

    async fn read_children(&self) -> Result<Box<dyn EntryPager>, EntryError> {
        let children = self
            .children
            .clone()
            .ok_or_else(|| EntryError::NotADirectory(self.name.clone()))?;
        Ok(Box::new(MemPager {
            remaining: children,
            page_size: self.page_size,
        }))
    }
}

struct MemPager {
    remaining: Vec<EntryRef>,
    page_size: usize,
}

#[async_trait]
impl EntryPager for MemPager {
    async fn next_page(&mut self) -> Result<Vec<EntryRef>, EntryError> {
        let take = self.remaining.len().min(self.page_size);
        Ok(self.remaining.drain(..take).collect())
    }
}
