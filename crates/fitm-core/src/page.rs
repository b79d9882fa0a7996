//! Pagination policy shared by every paginated listing.
//!
//! Listings always fetch one row more than the page size. If that extra row
//! comes back there is another page; it is trimmed before returning.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Cursor for the following page. Serialises as the page number, or `-1`
/// when there are no further pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPage {
  Page(u32),
  End,
}

impl Serialize for NextPage {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Self::Page(n) => serializer.serialize_i64(i64::from(*n)),
      Self::End => serializer.serialize_i64(-1),
    }
  }
}

impl<'de> Deserialize<'de> for NextPage {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = i64::deserialize(deserializer)?;
    Ok(match u32::try_from(raw) {
      Ok(n) if n > 0 => Self::Page(n),
      _ => Self::End,
    })
  }
}

/// `LIMIT` and `OFFSET` for a page.
///
/// Page 0 is the unpaginated first page; page `n >= 1` skips `n - 1` pages.
/// Both fetch `size + 1` rows.
pub fn window(page: u32, size: u32) -> (u32, u32) {
  let offset = page.saturating_sub(1).saturating_mul(size);
  (size.saturating_add(1), offset)
}

/// Clamp a caller-supplied page number. Negative pages become page 1.
pub fn normalize_page(raw: i64) -> u32 {
  if raw < 0 { 1 } else { u32::try_from(raw).unwrap_or(u32::MAX) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
  pub items:     Vec<T>,
  pub next_page: NextPage,
}

impl<T> Page<T> {
  /// Trim an over-fetched result set down to one page.
  pub fn from_fetched(mut rows: Vec<T>, page: u32, size: u32) -> Self {
    let size = size as usize;
    if rows.len() > size {
      rows.truncate(size);
      Self {
        items:     rows,
        next_page: NextPage::Page(page.max(1) + 1),
      }
    } else {
      Self {
        items:     rows,
        next_page: NextPage::End,
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extra_row_signals_next_page() {
    let page = Page::from_fetched((0..21).collect::<Vec<_>>(), 1, 20);
    assert_eq!(page.items.len(), 20);
    assert_eq!(page.next_page, NextPage::Page(2));
  }

  #[test]
  fn full_page_without_extra_row_ends() {
    let page = Page::from_fetched((0..20).collect::<Vec<_>>(), 1, 20);
    assert_eq!(page.items.len(), 20);
    assert_eq!(page.next_page, NextPage::End);
  }

  #[test]
  fn later_pages_advance() {
    let page = Page::from_fetched((0..21).collect::<Vec<_>>(), 3, 20);
    assert_eq!(page.next_page, NextPage::Page(4));
  }

  #[test]
  fn unpaginated_page_points_at_second_page() {
    let page = Page::from_fetched((0..21).collect::<Vec<_>>(), 0, 20);
    assert_eq!(page.next_page, NextPage::Page(2));
  }

  #[test]
  fn windows() {
    assert_eq!(window(0, 20), (21, 0));
    assert_eq!(window(1, 20), (21, 0));
    assert_eq!(window(3, 20), (21, 40));
  }

  #[test]
  fn negative_pages_normalise_to_one() {
    assert_eq!(normalize_page(-5), 1);
    assert_eq!(normalize_page(0), 0);
    assert_eq!(normalize_page(7), 7);
  }

  #[test]
  fn next_page_serialises_end_as_minus_one() {
    assert_eq!(serde_json::to_string(&NextPage::End).unwrap(), "-1");
    assert_eq!(serde_json::to_string(&NextPage::Page(2)).unwrap(), "2");
    let parsed: NextPage = serde_json::from_str("-1").unwrap();
    assert_eq!(parsed, NextPage::End);
  }
}
