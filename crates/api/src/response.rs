//! API response types.

use serde::{Deserialize, Serialize};

/// Paginated list envelope.
#[derive(Debug, Serialize)]
pub struct Page<T: Serialize> {
    /// Total number of matching rows.
    pub count: u64,
    /// Offset of the next page, when one exists.
    pub next: Option<u64>,
    /// Offset of the previous page, when one exists.
    pub previous: Option<u64>,
    pub results: Vec<T>,
}

impl<T: Serialize> Page<T> {
    /// Build a page from one result window.
    #[must_use]
    pub fn new(results: Vec<T>, count: u64, limit: u64, offset: u64) -> Self {
        let next = (offset + limit < count).then_some(offset + limit);
        let previous = (offset > 0).then(|| offset.saturating_sub(limit));

        Self {
            count,
            next,
            previous,
            results,
        }
    }
}

/// Common pagination query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: u64,
}

impl Pagination {
    /// Effective limit given the configured default page size.
    #[must_use]
    pub fn limit_or(&self, default: u64) -> u64 {
        self.limit.unwrap_or(default).clamp(1, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offsets() {
        let page = Page::new(vec![1, 2, 3], 10, 3, 3);
        assert_eq!(page.next, Some(6));
        assert_eq!(page.previous, Some(0));

        let first = Page::new(vec![1, 2, 3], 10, 3, 0);
        assert_eq!(first.previous, None);

        let last = Page::new(vec![1], 10, 3, 9);
        assert_eq!(last.next, None);
        assert_eq!(last.previous, Some(6));
    }

    #[test]
    fn test_pagination_limit_clamped() {
        let p = Pagination {
            limit: Some(1000),
            offset: 0,
        };
        assert_eq!(p.limit_or(10), 100);

        let p = Pagination {
            limit: None,
            offset: 0,
        };
        assert_eq!(p.limit_or(10), 10);
    }
}
