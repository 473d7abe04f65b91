use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

fn default_page() -> u32 {
    DEFAULT_PAGE
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

/// `?page=&limit=` query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Validate)]
pub struct Pagination {
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: u32,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Slices an already ordered, in-memory collection.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let start = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        items
            .iter()
            .skip(start)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_more: bool,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageInfo {
    pub fn new(pagination: Pagination, total: u64) -> Self {
        let limit = u64::from(pagination.limit.max(1));
        let has_next = u64::from(pagination.page) * limit < total;
        Self {
            page: pagination.page,
            limit: pagination.limit,
            total,
            total_pages: total.div_ceil(limit),
            has_more: has_next,
            has_next,
            has_prev: pagination.page > 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: PageInfo,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, pagination: Pagination, total: u64) -> Self {
        Self {
            items,
            pagination: PageInfo::new(pagination, total),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_page_of_fifteen() {
        let items: Vec<u32> = (0..15).collect();

        let first = Pagination::new(1, 10);
        assert_eq!(first.slice(&items).len(), 10);
        let info = PageInfo::new(first, 15);
        assert!(info.has_more);
        assert!(!info.has_prev);
        assert_eq!(info.total_pages, 2);

        let second = Pagination::new(2, 10);
        assert_eq!(second.slice(&items), vec![10, 11, 12, 13, 14]);
        let info = PageInfo::new(second, 15);
        assert!(!info.has_more);
        assert!(!info.has_next);
        assert!(info.has_prev);
    }

    #[test]
    fn empty_collection() {
        let info = PageInfo::new(Pagination::default(), 0);
        assert_eq!(info.total_pages, 0);
        assert!(!info.has_more);
    }

    #[test]
    fn constructor_clamps_out_of_range_values() {
        let p = Pagination::new(0, 500);
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, MAX_LIMIT);
        assert!(Pagination { page: 0, limit: 10 }.validate().is_err());
        assert!(Pagination { page: 1, limit: 101 }.validate().is_err());
    }
}
