//! Opaque offset cursors over stable listings.
//!
//! A cursor is base64 of `{"offset": n}`. Decoding never fails: anything
//! malformed reads as offset 0.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub offset: u64,
}

impl Cursor {
    pub fn new(offset: usize) -> Self {
        Self {
            offset: offset as u64,
        }
    }

    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        STANDARD.encode(json)
    }

    /// Decode a token, degrading to offset 0 on any error.
    pub fn decode(token: &str) -> Self {
        let decoded = STANDARD
            .decode(token.trim())
            .ok()
            .and_then(|bytes| serde_json::from_slice::<Cursor>(&bytes).ok());
        match decoded {
            Some(cursor) => cursor,
            None => {
                tracing::debug!("Ignoring malformed cursor {token:?}");
                Self { offset: 0 }
            }
        }
    }

    pub fn offset(&self) -> usize {
        usize::try_from(self.offset).unwrap_or(usize::MAX)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// Slice a listing into a page.
///
/// A listing that fits in one page is returned whole, without a cursor, when
/// the caller did not pass one.
pub fn paginate<T>(items: Vec<T>, cursor: Option<&str>, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total = items.len();

    if cursor.is_none() && total <= page_size {
        return Page {
            items,
            next_cursor: None,
        };
    }

    let offset = cursor.map(|c| Cursor::decode(c).offset()).unwrap_or(0);
    let end = offset.saturating_add(page_size);
    let next_cursor = (end < total).then(|| Cursor::new(end).encode());

    let items = items
        .into_iter()
        .skip(offset)
        .take(page_size)
        .collect();

    Page { items, next_cursor }
}
