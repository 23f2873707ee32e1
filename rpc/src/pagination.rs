//! Cursor-based pagination utilities for list endpoints.

use serde::{Deserialize, Serialize};

/// Default page size when `count` is not specified.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Maximum allowed page size.
pub const MAX_PAGE_SIZE: u32 = 200;

/// Common pagination parameters accepted by list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    /// Opaque cursor from a previous response (hex-encoded offset).
    pub cursor: Option<String>,
    /// Number of items per page (default 50, max 200).
    pub count: Option<u32>,
}

impl PaginationParams {
    /// Resolve effective page size, clamped to [1, MAX_PAGE_SIZE].
    pub fn effective_count(&self) -> u32 {
        self.count
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// Decode the cursor to a numeric offset. Returns 0 if cursor is absent or
    /// invalid.
    pub fn decode_offset(&self) -> u64 {
        self.cursor
            .as_deref()
            .and_then(decode_cursor)
            .unwrap_or(0)
    }

    /// Slice one page out of `items`, returning it with the next cursor.
    pub fn page<T>(&self, items: Vec<T>) -> (Vec<T>, PaginationMeta) {
        let offset = self.decode_offset();
        let count = self.effective_count();
        let total = items.len() as u64;
        let page: Vec<T> = items
            .into_iter()
            .skip(offset.min(total) as usize)
            .take(count as usize)
            .collect();
        let cursor = next_cursor(offset, page.len(), count, total);
        (page, PaginationMeta { cursor })
    }
}

/// Pagination metadata included in list responses.
#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
    /// Cursor to pass for the next page, or `None` if this is the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Encode a numeric offset into an opaque cursor string.
pub fn encode_cursor(offset: u64) -> String {
    hex::encode(offset.to_be_bytes())
}

/// Decode a cursor string back to a numeric offset.
pub fn decode_cursor(cursor: &str) -> Option<u64> {
    let bytes: [u8; 8] = hex::decode(cursor).ok()?.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Compute the next-page cursor. Returns `None` when the page was short or
/// reached the end of the list.
pub fn next_cursor(current_offset: u64, returned: usize, page_size: u32, total: u64) -> Option<String> {
    let next = current_offset + returned as u64;
    if (returned as u32) < page_size || next >= total {
        None
    } else {
        Some(encode_cursor(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_cursor_starts_from_zero() {
        let p = PaginationParams {
            cursor: Some("not-hex".into()),
            count: None,
        };
        assert_eq!(p.decode_offset(), 0);
        assert_eq!(decode_cursor("00ff"), None);
    }

    #[test]
    fn next_cursor_returns_none_at_end() {
        assert!(next_cursor(0, 30, 50, 30).is_none());
        assert!(next_cursor(0, 50, 50, 50).is_none());
    }

    #[test]
    fn pages_walk_the_whole_list() {
        let items: Vec<u32> = (0..7).collect();
        let first = PaginationParams {
            cursor: None,
            count: Some(3),
        };
        let (page, meta) = first.page(items.clone());
        assert_eq!(page, vec![0, 1, 2]);

        let second = PaginationParams {
            cursor: meta.cursor,
            count: Some(3),
        };
        let (page, meta) = second.page(items.clone());
        assert_eq!(page, vec![3, 4, 5]);

        let third = PaginationParams {
            cursor: meta.cursor,
            count: Some(3),
        };
        let (page, meta) = third.page(items);
        assert_eq!(page, vec![6]);
        assert!(meta.cursor.is_none());
    }

    #[test]
    fn effective_count_clamps() {
        let p = PaginationParams {
            cursor: None,
            count: Some(5000),
        };
        assert_eq!(p.effective_count(), 200);
        assert_eq!(PaginationParams::default().effective_count(), 50);
    }
}
