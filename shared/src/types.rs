//! Common types used across the platform

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 50,
        }
    }
}

impl Pagination {
    /// Largest page size a client may request
    pub const MAX_PER_PAGE: u32 = 200;

    /// Clamp to sane bounds and return (limit, offset) for SQL
    pub fn limit_offset(&self) -> (i64, i64) {
        let per_page = self.per_page.clamp(1, Self::MAX_PER_PAGE) as i64;
        let page = self.page.max(1) as i64;
        (per_page, (page - 1) * per_page)
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl PaginationMeta {
    pub fn new(pagination: &Pagination, total_items: u64) -> Self {
        let (per_page, _) = pagination.limit_offset();
        let per_page = per_page as u64;
        Self {
            page: pagination.page.max(1),
            per_page: per_page as u32,
            total_items,
            total_pages: total_items.div_ceil(per_page) as u32,
        }
    }
}

/// Inclusive date range for queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// First day an open range covers. Postgres `DATE` cannot hold `NaiveDate::MIN`.
    pub fn earliest() -> NaiveDate {
        NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last day an open range covers
    pub fn latest() -> NaiveDate {
        NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
    }

    /// Build a range; open ends cover every storable date
    pub fn from_bounds(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self {
            start: start.unwrap_or_else(Self::earliest),
            end: end.unwrap_or_else(Self::latest),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_offset_clamps() {
        let p = Pagination { page: 0, per_page: 10_000 };
        assert_eq!(p.limit_offset(), (200, 0));

        let p = Pagination { page: 3, per_page: 25 };
        assert_eq!(p.limit_offset(), (25, 50));
    }

    #[test]
    fn test_pagination_meta_pages() {
        let p = Pagination { page: 1, per_page: 20 };
        assert_eq!(PaginationMeta::new(&p, 41).total_pages, 3);
        assert_eq!(PaginationMeta::new(&p, 0).total_pages, 0);
    }

    #[test]
    fn test_date_range_contains() {
        let d = |s: &str| s.parse::<NaiveDate>().unwrap();
        let range = DateRange::from_bounds(Some(d("2024-03-01")), Some(d("2024-03-31")));
        assert!(range.contains(d("2024-03-01")));
        assert!(range.contains(d("2024-03-31")));
        assert!(!range.contains(d("2024-04-01")));
        assert!(DateRange::from_bounds(None, None).contains(d("2024-06-15")));
        assert!(DateRange::from_bounds(None, None).contains(d("1999-12-31")));
        assert!(DateRange::from_bounds(None, Some(d("2024-03-31"))).contains(d("1987-07-04")));
        assert!(DateRange::from_bounds(Some(d("2024-03-01")), None).contains(d("2150-01-01")));
    }
}
