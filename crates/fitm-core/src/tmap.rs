//! Treasure maps: a user's submitted, copied and tagged links, plus the
//! category facets found across them.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  category::{CatCount, CategorySet, count_categories},
  link::LinkView,
};

/// Public profile of a treasure map owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub login_name: String,
  pub about:      String,
  pub pfp:        String,
  pub created:    DateTime<Utc>,
}

/// A link as it appears in someone's treasure map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TmapLink {
  #[serde(flatten)]
  pub view:           LinkView,
  /// Whether `categories` came from the owner's own tag rather than the
  /// global consensus.
  pub cats_from_user: bool,
}

/// What the aggregator needs to know about a section entry.
pub trait MapEntry {
  fn link_id(&self) -> i64;
  fn categories(&self) -> &str;
}

impl MapEntry for TmapLink {
  fn link_id(&self) -> i64 { self.view.link.id }

  fn categories(&self) -> &str { &self.view.link.categories }
}

// ─── Sections ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreasureMapSections<T> {
  pub submitted:  Vec<T>,
  pub copied:     Vec<T>,
  /// Tagged by the owner, submitted by someone else, and not copied.
  pub tagged:     Vec<T>,
  pub categories: Vec<CatCount>,
}

impl<T: MapEntry> TreasureMapSections<T> {
  /// Merge the three subsets and compute facets over their union.
  ///
  /// A link present in `copied` is dropped from `tagged`. Categories in
  /// `filter` are left out of the facets.
  pub fn assemble(
    submitted: Vec<T>,
    copied: Vec<T>,
    mut tagged: Vec<T>,
    filter: Option<&CategorySet>,
    facet_limit: usize,
  ) -> Self {
    let copied_ids: HashSet<i64> = copied.iter().map(MapEntry::link_id).collect();
    tagged.retain(|entry| !copied_ids.contains(&entry.link_id()));

    let fields = submitted
      .iter()
      .chain(&copied)
      .chain(&tagged)
      .map(MapEntry::categories);
    let categories = count_categories(fields, filter, facet_limit);

    Self {
      submitted,
      copied,
      tagged,
      categories,
    }
  }

  pub fn len(&self) -> usize { self.submitted.len() + self.copied.len() + self.tagged.len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// A full treasure map. The profile is only included on the unfiltered view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreasureMap {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub profile:  Option<Profile>,
  #[serde(flatten)]
  pub sections: TreasureMapSections<TmapLink>,
}
