//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are fixed-width RFC 3339 UTC strings with microsecond precision,
//! so lexical order is chronological order. User ids are hyphenated lowercase
//! UUIDs.

use chrono::{DateTime, SecondsFormat, Utc};
use fitm_core::{
  link::{Link, LinkView, ViewerFlags},
  tag::Tag,
  tmap::{Profile, TmapLink},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Columns of a composed listing row, in select order.
pub struct RawLink {
  pub id:             i64,
  pub url:            String,
  pub submitted_by:   String,
  pub submit_date:    String,
  pub categories:     String,
  pub summary:        String,
  pub summary_count:  u32,
  pub tag_count:      u32,
  pub like_count:     u32,
  pub img_url:        Option<String>,
  /// Present on owner listings only.
  pub cats_from_user: Option<bool>,
  pub viewer:         Option<ViewerFlags>,
}

impl RawLink {
  /// Read a row laid out by [`crate::query::LinkQuery`]. Optional trailing
  /// columns are looked up by name.
  pub fn from_row(
    row: &rusqlite::Row<'_>,
    owner_columns: bool,
    viewer_columns: bool,
  ) -> rusqlite::Result<Self> {
    let cats_from_user = if owner_columns {
      Some(row.get("cats_from_user")?)
    } else {
      None
    };
    let viewer = if viewer_columns {
      Some(ViewerFlags {
        is_liked:  row.get("is_liked")?,
        is_copied: row.get("is_copied")?,
        is_tagged: row.get("is_tagged")?,
      })
    } else {
      None
    };

    Ok(Self {
      id: row.get("link_id")?,
      url: row.get("url")?,
      submitted_by: row.get("submitted_by")?,
      submit_date: row.get("submit_date")?,
      categories: row.get("cats")?,
      summary: row.get("summary")?,
      summary_count: row.get("summary_count")?,
      tag_count: row.get("tag_count")?,
      like_count: row.get("like_count")?,
      img_url: row.get("img_url")?,
      cats_from_user,
      viewer,
    })
  }

  pub fn into_view(self) -> Result<LinkView> {
    Ok(LinkView {
      link:   Link {
        id:            self.id,
        url:           self.url,
        submitted_by:  self.submitted_by,
        submit_date:   decode_dt(&self.submit_date)?,
        categories:    self.categories,
        summary:       self.summary,
        summary_count: self.summary_count,
        tag_count:     self.tag_count,
        like_count:    self.like_count,
        img_url:       self.img_url.filter(|u| !u.is_empty()),
      },
      viewer: self.viewer,
    })
  }

  pub fn into_tmap_link(self) -> Result<TmapLink> {
    let cats_from_user = self.cats_from_user.unwrap_or(false);
    Ok(TmapLink {
      view: self.into_view()?,
      cats_from_user,
    })
  }
}

/// Raw strings read directly from a `Tags` row.
pub struct RawTag {
  pub id:           i64,
  pub link_id:      i64,
  pub categories:   String,
  pub submitted_by: String,
  pub last_updated: String,
}

impl RawTag {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      link_id:      row.get(1)?,
      categories:   row.get(2)?,
      submitted_by: row.get(3)?,
      last_updated: row.get(4)?,
    })
  }

  pub fn into_tag(self) -> Result<Tag> {
    Ok(Tag {
      id:           self.id,
      link_id:      self.link_id,
      categories:   self.categories,
      submitted_by: self.submitted_by,
      last_updated: decode_dt(&self.last_updated)?,
    })
  }
}

/// Raw strings read directly from a `Users` row.
pub struct RawProfile {
  pub login_name: String,
  pub about:      String,
  pub pfp:        String,
  pub created:    String,
}

impl RawProfile {
  pub fn into_profile(self) -> Result<Profile> {
    Ok(Profile {
      login_name: self.login_name,
      about:      self.about,
      pfp:        self.pfp,
      created:    decode_dt(&self.created)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_are_fixed_width() {
    let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let b = a + chrono::Duration::milliseconds(1500);
    let (ea, eb) = (encode_dt(a), encode_dt(b));
    assert_eq!(ea, "2024-01-01T00:00:00.000000Z");
    assert_eq!(ea.len(), eb.len());
    assert!(ea < eb);
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }

  #[test]
  fn bad_timestamps_are_reported() {
    assert!(matches!(decode_dt("yesterday"), Err(Error::DateParse(_))));
  }
}
