//! Link records as read back from storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A submitted link with its derived columns and counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
  pub id:            i64,
  pub url:           String,
  pub submitted_by:  String,
  pub submit_date:   DateTime<Utc>,
  /// The consensus category string, or the owner's own tag in a treasure map.
  pub categories:    String,
  pub summary:       String,
  pub summary_count: u32,
  pub tag_count:     u32,
  pub like_count:    u32,
  pub img_url:       Option<String>,
}

/// Per-viewer personalisation columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerFlags {
  pub is_liked:  bool,
  pub is_copied: bool,
  pub is_tagged: bool,
}

/// A link as seen by a particular (possibly anonymous) viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkView {
  #[serde(flatten)]
  pub link:   Link,
  /// Absent for anonymous viewers.
  #[serde(flatten, skip_serializing_if = "Option::is_none")]
  pub viewer: Option<ViewerFlags>,
}

impl LinkView {
  pub fn id(&self) -> i64 { self.link.id }
}

/// A user ranked by the number of links they have submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
  pub login_name:      String,
  pub links_submitted: u32,
}
