//! Tags and the ranked tag page of a link.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{consensus::lifespan_ratio, link::LinkView};

/// One user's category assignment for one link. Editing replaces the
/// categories and `last_updated` in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
  pub id:           i64,
  pub link_id:      i64,
  pub categories:   String,
  pub submitted_by: String,
  pub last_updated: DateTime<Utc>,
}

/// A tag on the tag page, scored by how long it has stood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRanking {
  /// Lifespan ratio as a percentage; not square-rooted.
  pub lifespan_overlap: f64,
  pub categories:       String,
  pub submitted_by:     String,
  pub last_updated:     DateTime<Utc>,
}

impl TagRanking {
  /// Score, order (highest first) and cap a link's tags.
  pub fn rank(
    tags: Vec<Tag>,
    link_submitted: DateTime<Utc>,
    now: DateTime<Utc>,
    limit: usize,
  ) -> Vec<Self> {
    let mut rankings: Vec<Self> = tags
      .into_iter()
      .map(|tag| Self {
        lifespan_overlap: lifespan_ratio(now, link_submitted, tag.last_updated) * 100.0,
        categories:       tag.categories,
        submitted_by:     tag.submitted_by,
        last_updated:     tag.last_updated,
      })
      .collect();

    rankings.sort_by(|a, b| {
      b.lifespan_overlap
        .total_cmp(&a.lifespan_overlap)
        .then_with(|| a.submitted_by.cmp(&b.submitted_by))
    });
    rankings.truncate(limit);
    rankings
  }
}

/// Everything shown on a link's tag page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagPage {
  pub link:       LinkView,
  /// The viewer's own tag on this link, if they are signed in and have one.
  pub viewer_tag: Option<Tag>,
  pub rankings:   Vec<TagRanking>,
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;

  fn tag(by: &str, at: DateTime<Utc>) -> Tag {
    Tag {
      id:           0,
      link_id:      1,
      categories:   "x".into(),
      submitted_by: by.into(),
      last_updated: at,
    }
  }

  #[test]
  fn older_tags_rank_first_and_limit_applies() {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let now = t0 + Duration::days(100);
    let tags = vec![
      tag("late", t0 + Duration::days(75)),
      tag("first", t0),
      tag("mid", t0 + Duration::days(50)),
    ];

    let ranked = TagRanking::rank(tags, t0, now, 2);
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].submitted_by, "first");
    assert!((ranked[0].lifespan_overlap - 100.0).abs() < 1e-9);
    assert_eq!(ranked[1].submitted_by, "mid");
    assert!((ranked[1].lifespan_overlap - 50.0).abs() < 1e-9);
  }
}
