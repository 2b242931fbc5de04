use serde::{Deserialize, Serialize};

use crate::constants::MAX_PAGE_SIZE;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PageContext<T> {
    pub rows: Vec<T>,
    pub total_rows: i64,
    pub limit: i64,
    pub next_offset: Option<i64>,
    pub prev_offset: Option<i64>,
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, limit: i64, current_offset: i64) -> Self {
        let next_offset =
            (current_offset + limit < total_rows).then_some(current_offset + limit);
        let prev_offset = (current_offset > 0).then(|| (current_offset - limit).max(0));

        Self {
            rows,
            total_rows,
            limit,
            next_offset,
            prev_offset,
        }
    }

    pub fn no_rows(limit: i64) -> Self {
        Self {
            rows: vec![],
            total_rows: 0,
            limit,
            next_offset: None,
            prev_offset: None,
        }
    }
}

/* limit/offset are kept as raw strings so that malformed values fall back
to defaults instead of rejecting the request */
#[derive(Deserialize, Debug, Default, Clone)]
pub struct PageQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl PageQuery {
    pub fn limit(&self, default: i64) -> i64 {
        self.limit
            .as_deref()
            .and_then(|value| value.parse::<i64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(default)
            .min(MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset
            .as_deref()
            .and_then(|value| value.parse::<i64>().ok())
            .filter(|value| *value >= 0)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page_has_no_prev_offset() {
        let page = PageContext::from_rows(vec![1, 2, 3], 30, 10, 0);
        assert_eq!(page.prev_offset, None);
        assert_eq!(page.next_offset, Some(10));
        assert_eq!(page.total_rows, 30);
    }

    #[test]
    fn test_last_page_has_no_next_offset() {
        let page = PageContext::from_rows(vec![1], 21, 10, 20);
        assert_eq!(page.next_offset, None);
        assert_eq!(page.prev_offset, Some(10));
    }

    #[test]
    fn test_middle_page_has_both_offsets() {
        let page = PageContext::from_rows(vec![1, 2], 25, 10, 10);
        assert_eq!(page.next_offset, Some(20));
        assert_eq!(page.prev_offset, Some(0));
    }

    #[test]
    fn test_no_rows_is_empty() {
        let page: PageContext<i32> = PageContext::no_rows(10);
        assert!(page.rows.is_empty());
        assert_eq!(page.total_rows, 0);
        assert_eq!(page.next_offset, None);
    }

    #[test]
    fn test_limit_falls_back_on_garbage() {
        let query = PageQuery {
            limit: Some("abc".to_string()),
            offset: None,
        };
        assert_eq!(query.limit(10), 10);
    }

    #[test]
    fn test_limit_rejects_non_positive_values() {
        let query = PageQuery {
            limit: Some("-3".to_string()),
            offset: None,
        };
        assert_eq!(query.limit(10), 10);
    }

    #[test]
    fn test_limit_is_clamped() {
        let query = PageQuery {
            limit: Some("5000".to_string()),
            offset: None,
        };
        assert_eq!(query.limit(10), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_offset_ignores_garbage() {
        let query = PageQuery {
            limit: None,
            offset: Some("later".to_string()),
        };
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn test_offset_parses_valid_values() {
        let query = PageQuery {
            limit: None,
            offset: Some("40".to_string()),
        };
        assert_eq!(query.offset(), 40);
    }
}
