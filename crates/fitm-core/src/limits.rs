//! Tunable result-size limits shared by every backend.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
  /// Links per page; one extra row is always fetched to detect a next page.
  pub links_page_size:            u32,
  pub tag_rankings_limit:         u32,
  /// Facet entries returned with a treasure map.
  pub treasure_map_facets:        usize,
  pub category_counts_limit:      u32,
  pub more_category_counts_limit: u32,
  pub contributors_limit:         u32,
  pub suggestions_limit:          u32,
  pub max_categories_per_tag:     usize,
  pub max_category_chars:         usize,
}

impl Default for Limits {
  fn default() -> Self {
    Self {
      links_page_size:            20,
      tag_rankings_limit:         20,
      treasure_map_facets:        12,
      category_counts_limit:      20,
      more_category_counts_limit: 100,
      contributors_limit:         10,
      suggestions_limit:          3,
      max_categories_per_tag:     5,
      max_category_chars:         32,
    }
  }
}
