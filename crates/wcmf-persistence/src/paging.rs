//! Paging of object loads.

/// Page window and total count of a paged load.
///
/// Pages are numbered from 1. The mapper fills in the total count with a
/// `COUNT(*)` query unless the caller opts out with `ignore_total`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagingInfo {
    page_size: Option<u64>,
    page: u64,
    ignore_total: bool,
    total_count: u64,
}

impl PagingInfo {
    /// Paging with `page_size` rows per page; `None` loads all rows.
    pub fn new(page_size: Option<u64>, ignore_total: bool) -> Self {
        Self {
            page_size,
            page: 1,
            ignore_total,
            total_count: 0,
        }
    }

    /// Exactly one row, no count query.
    pub fn single() -> Self {
        Self::new(Some(1), true)
    }

    /// Select a page.
    pub fn page(mut self, page: u64) -> Self {
        self.set_page(page);
        self
    }

    pub fn set_page(&mut self, page: u64) {
        self.page = page.max(1);
    }

    pub fn current_page(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> Option<u64> {
        self.page_size
    }

    pub fn ignore_total(&self) -> bool {
        self.ignore_total
    }

    /// Rows skipped before the current page.
    pub fn offset(&self) -> u64 {
        self.page_size.map_or(0, |size| (self.page - 1) * size)
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn set_total_count(&mut self, total: u64) {
        self.total_count = total;
    }

    /// Number of pages for the last known total.
    pub fn page_count(&self) -> u64 {
        match self.page_size {
            Some(0) => 0,
            Some(size) => self.total_count.div_ceil(size),
            None => u64::from(self.total_count > 0),
        }
    }

    pub fn is_on_first_page(&self) -> bool {
        self.page == 1
    }

    pub fn is_on_last_page(&self) -> bool {
        self.page >= self.page_count()
    }
}

impl Default for PagingInfo {
    fn default() -> Self {
        Self::new(None, false)
    }
}
