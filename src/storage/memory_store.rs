//! In-memory page store for tests, benchmarks and throwaway trees.

use std::collections::HashSet;

use crate::common::config::MAX_PAGES;
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;
use crate::storage::page_store::PageStore;

/// A [`PageStore`] kept entirely in memory.
///
/// Same addressing rules as [`DiskManager`](super::DiskManager): slot 0 is
/// the metadata block, data pages start at 1, and released ids stay dead.
pub struct MemoryStore {
    /// `None` marks a deallocated page.
    pages: Vec<Option<Box<Page>>>,
    /// Allocated but not yet written formatted.
    fresh: HashSet<u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            pages: vec![Some(Box::new(Page::new()))],
            fresh: HashSet::new(),
        }
    }

    fn slot(&mut self, page_id: PageId) -> Result<&mut Box<Page>> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id.0));
        }
        self.pages
            .get_mut(page_id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(Error::PageNotFound(page_id.0))
    }

    fn meta(&mut self) -> &mut Box<Page> {
        self.pages[0].get_or_insert_with(|| Box::new(Page::new()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PageStore for MemoryStore {
    fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        let stored = self.slot(page_id)?;
        let mut page = Page::new();
        page.copy_from(stored);
        Ok(page)
    }

    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.slot(page_id)?.copy_from(page);
        if !page.is_zeroed() {
            self.fresh.remove(&page_id.0);
        }
        Ok(())
    }

    fn allocate_page(&mut self) -> Result<PageId> {
        let id = u32::try_from(self.pages.len()).map_err(|_| Error::StoreFull {
            max_pages: MAX_PAGES,
        })?;
        self.pages.push(Some(Box::new(Page::new())));
        self.fresh.insert(id);
        Ok(PageId::new(id))
    }

    fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        self.slot(page_id)?;
        self.pages[page_id.0 as usize] = None;
        self.fresh.remove(&page_id.0);
        Ok(())
    }

    fn read_meta(&mut self) -> Result<Page> {
        let mut page = Page::new();
        page.copy_from(self.meta());
        Ok(page)
    }

    fn write_meta(&mut self, page: &Page) -> Result<()> {
        self.meta().copy_from(page);
        Ok(())
    }

    fn is_fresh(&self, page_id: PageId) -> bool {
        self.fresh.contains(&page_id.0)
    }

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }
}
