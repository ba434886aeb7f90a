use serde::{Deserialize, Serialize};

use super::cursor::Cursor;
use super::error::PaginationError;

/// Where a page starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Start,
    After(Cursor),
    /// Plain row offset, produced by numeric page-index cursors
    Offset(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub position: Position,
    pub limit: u32,
}

/// `?cursor=...&limit=...` query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

impl PageRequest {
    pub fn first(limit: u32) -> Self {
        Self {
            position: Position::Start,
            limit: limit.max(1),
        }
    }

    pub fn after(cursor: Cursor, limit: u32) -> Self {
        Self {
            position: Position::After(cursor),
            limit: limit.max(1),
        }
    }

    /// Build a request from query parameters.
    ///
    /// The limit falls back to `default_limit` and is clamped to
    /// `1..=max_limit`. A cursor that does not decode but parses as a page
    /// index `p` becomes `Offset(p * limit)`.
    pub fn from_query(
        query: &PageQuery,
        default_limit: u32,
        max_limit: u32,
    ) -> Result<Self, PaginationError> {
        let limit = query
            .limit
            .unwrap_or(default_limit)
            .clamp(1, max_limit.max(1));

        let position = match query.cursor.as_deref().map(str::trim) {
            None | Some("") => Position::Start,
            Some(raw) => match Cursor::decode(raw) {
                Ok(cursor) => Position::After(cursor),
                Err(err) => match raw.parse::<u64>() {
                    Ok(page_index) => Position::Offset(page_index.saturating_mul(limit as u64)),
                    Err(_) => return Err(err),
                },
            },
        };

        Ok(Self { position, limit })
    }

    /// Rows to fetch: one more than the page size, to detect a next page
    pub fn fetch_limit(&self) -> i64 {
        self.limit as i64 + 1
    }

    /// Apply this request to rows already sorted newest first.
    pub fn slice<T, I>(&self, rows: I) -> Vec<T>
    where
        T: Keyset,
        I: IntoIterator<Item = T>,
    {
        let take = self.fetch_limit() as usize;
        match self.position {
            Position::Start => rows.into_iter().take(take).collect(),
            Position::Offset(n) => rows.into_iter().skip(n as usize).take(take).collect(),
            Position::After(cursor) => rows
                .into_iter()
                .filter(|row| {
                    let c = row.cursor();
                    cursor.precedes(c.created_at, c.id)
                })
                .take(take)
                .collect(),
        }
    }
}

/// Rows that can be positioned by a cursor
pub trait Keyset {
    fn cursor(&self) -> Cursor;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
    /// `None` only when read from a server that does not report it
    #[serde(default)]
    pub has_more: Option<bool>,
}

impl<T: Keyset> Page<T> {
    /// Build a page from at most `limit + 1` fetched rows
    pub fn from_rows(mut rows: Vec<T>, request: &PageRequest) -> Self {
        let limit = request.limit as usize;
        let has_more = rows.len() > limit;
        rows.truncate(limit);

        let next_cursor = if has_more {
            rows.last().map(|row| row.cursor().encode())
        } else {
            None
        };

        Self {
            items: rows,
            next_cursor,
            has_more: Some(has_more),
        }
    }
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
            has_more: Some(false),
        }
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
            has_more: self.has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    #[derive(Debug, Clone)]
    struct Row(Cursor);

    impl Keyset for Row {
        fn cursor(&self) -> Cursor {
            self.0
        }
    }

    /// Ten rows, one minute apart, newest first
    fn rows() -> Vec<Row> {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        (0..10)
            .rev()
            .map(|i| Row(Cursor::new(base + Duration::minutes(i), Uuid::from_u128(i as u128))))
            .collect()
    }

    #[test]
    fn first_page_reports_more() {
        let request = PageRequest::first(4);
        let page = Page::from_rows(request.slice(rows()), &request);
        assert_eq!(page.items.len(), 4);
        assert_eq!(page.has_more, Some(true));
        assert!(page.next_cursor.is_some());
    }

    #[test]
    fn walking_cursors_visits_every_row_once() {
        let all = rows();
        let mut seen = Vec::new();
        let mut request = PageRequest::first(3);
        loop {
            let page = Page::from_rows(request.slice(all.clone()), &request);
            seen.extend(page.items.iter().map(|r| r.0.id));
            match page.next_cursor {
                Some(next) => request = PageRequest::after(Cursor::decode(&next).unwrap(), 3),
                None => break,
            }
        }
        let expected: Vec<Uuid> = all.iter().map(|r| r.0.id).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn rows_sharing_a_timestamp_are_not_skipped() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let all: Vec<Row> = (0..5u128).rev().map(|i| Row(Cursor::new(at, Uuid::from_u128(i)))).collect();

        let first = PageRequest::first(2);
        let page = Page::from_rows(first.slice(all.clone()), &first);
        let next = Cursor::decode(page.next_cursor.as_deref().unwrap()).unwrap();
        let second = PageRequest::after(next, 2);
        let page2 = Page::from_rows(second.slice(all), &second);

        let ids: Vec<u128> = page2.items.iter().map(|r| r.0.id.as_u128()).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn exact_fit_has_no_next_page() {
        let request = PageRequest::first(10);
        let page = Page::from_rows(request.slice(rows()), &request);
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.has_more, Some(false));
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn query_limit_is_defaulted_and_clamped() {
        let q = PageQuery::default();
        assert_eq!(PageRequest::from_query(&q, 12, 100).unwrap().limit, 12);

        let q = PageQuery { cursor: None, limit: Some(0) };
        assert_eq!(PageRequest::from_query(&q, 12, 100).unwrap().limit, 1);

        let q = PageQuery { cursor: None, limit: Some(5000) };
        assert_eq!(PageRequest::from_query(&q, 12, 100).unwrap().limit, 100);
    }

    #[test]
    fn numeric_cursor_falls_back_to_offset() {
        let q = PageQuery { cursor: Some("2".into()), limit: Some(12) };
        let request = PageRequest::from_query(&q, 12, 100).unwrap();
        assert_eq!(request.position, Position::Offset(24));

        let q = PageQuery { cursor: Some("0".into()), limit: None };
        let request = PageRequest::from_query(&q, 12, 100).unwrap();
        assert_eq!(request.position, Position::Offset(0));
    }

    #[test]
    fn unparseable_cursor_is_rejected() {
        let q = PageQuery { cursor: Some("%%%".into()), limit: None };
        assert!(PageRequest::from_query(&q, 12, 100).is_err());
    }

    #[test]
    fn has_more_is_optional_on_the_wire() {
        let page: Page<u8> = serde_json::from_str(r#"{"items":[1],"next_cursor":null}"#).unwrap();
        assert_eq!(page.has_more, None);

        let request = PageRequest::first(1);
        let json = serde_json::to_value(Page::from_rows(request.slice(rows()), &request).map(|r| r.0.id)).unwrap();
        assert_eq!(json["has_more"], true);
    }

    #[test]
    fn offset_slice_skips_rows() {
        let request = PageRequest { position: Position::Offset(8), limit: 5 };
        let page = Page::from_rows(request.slice(rows()), &request);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.has_more, Some(false));
    }
}
