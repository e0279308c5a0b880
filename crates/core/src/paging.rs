use crate::SearchError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// A validated page request. Page numbers start at 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase", try_from = "RawPaging")]
pub struct Paging {
    page: u64,
    page_size: u64,
}

impl Paging {
    pub fn new(page: i64, page_size: i64) -> Result<Self, SearchError> {
        if page < 1 {
            return Err(SearchError::invalid(format!(
                "page must be 1 or greater, got {page}"
            )));
        }
        if page_size < 1 {
            return Err(SearchError::invalid(format!(
                "page size must be greater than 0, got {page_size}"
            )));
        }

        Ok(Self {
            page: page.unsigned_abs(),
            page_size: page_size.unsigned_abs(),
        })
    }

    pub fn first(page_size: u64) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn skip(&self) -> u64 {
        self.page_size.saturating_mul(self.page.saturating_sub(1))
    }

    pub fn take(&self) -> u64 {
        self.page_size
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPaging {
    page: i64,
    page_size: i64,
}

impl TryFrom<RawPaging> for Paging {
    type Error = SearchError;

    fn try_from(raw: RawPaging) -> Result<Self, Self::Error> {
        Self::new(raw.page, raw.page_size)
    }
}

impl Default for Paging {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}
