//! Page envelope returned by list queries.

use serde::{Deserialize, Serialize};

/// One page of a filtered collection plus its totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: u64,
    pub total_documents: u64,
}

impl<T> Page<T> {
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            data: self.data.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
            total_documents: self.total_documents,
        }
    }

    pub fn try_map<U, E, F>(self, f: F) -> Result<Page<U>, E>
    where
        F: FnMut(T) -> Result<U, E>,
    {
        Ok(Page {
            data: self.data.into_iter().map(f).collect::<Result<Vec<_>, E>>()?,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
            total_documents: self.total_documents,
        })
    }
}

/// Resolved page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub page: i64,
    pub page_size: i64,
    pub skip: u64,
    pub limit: i64,
}

impl Window {
    /// `skip = (page - 1) * size` for positive pages, 0 otherwise. The size
    /// is capped at `max_page_size`, which a non-positive `page_size` also
    /// falls back to. `skip` never exceeds `i64::MAX`, the largest offset the
    /// database accepts.
    pub fn new(page: i64, page_size: i64, max_page_size: i64) -> Self {
        let max = max_page_size.max(1);
        let size = if page_size > 0 { page_size.min(max) } else { max };
        let skip = if page > 0 {
            ((page - 1) as u64).saturating_mul(size as u64).min(i64::MAX as u64)
        } else {
            0
        };
        Self { page, page_size: size, skip, limit: size }
    }

    /// `ceil(total / size)`, at least 1.
    pub fn total_pages(&self, total_documents: u64) -> u64 {
        total_documents.div_ceil(self.page_size as u64).max(1)
    }
}
