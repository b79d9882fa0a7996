//! The `LinkStore` trait and its request types.
//!
//! Requests carry caller input as given. Validation (empty category lists,
//! unknown period tokens) happens inside the backend when the request is
//! turned into queries, so every backend reports the same errors.

use std::future::Future;

use uuid::Uuid;

use crate::{
  category::CatCount,
  consensus::Recomputed,
  link::{Contributor, LinkView},
  page::Page,
  tag::TagPage,
  tmap::TreasureMap,
};

// ─── Requests ────────────────────────────────────────────────────────────────

/// Parameters for [`LinkStore::top_links`].
#[derive(Debug, Clone, Default)]
pub struct TopLinksRequest {
  /// Every returned link must carry all of these categories.
  pub categories:   Option<Vec<String>>,
  /// `day`, `week`, `month` or `year`. `None` means all time.
  pub period:       Option<String>,
  /// User id of the signed-in viewer, for personalisation flags.
  pub viewer:       Option<Uuid>,
  /// 0 for the unpaginated first page, otherwise a 1-based page number.
  pub page:         u32,
  pub include_nsfw: bool,
}

/// Parameters for [`LinkStore::treasure_map`].
#[derive(Debug, Clone, Default)]
pub struct TreasureMapRequest {
  /// Login name of the map's owner.
  pub owner:        String,
  pub viewer:       Option<Uuid>,
  pub categories:   Option<Vec<String>>,
  pub include_nsfw: bool,
}

/// Parameters for [`LinkStore::top_categories`].
#[derive(Debug, Clone, Default)]
pub struct CategoryCountsRequest {
  pub period:     Option<String>,
  /// Restrict to links carrying all of these; they are left out of the result.
  pub categories: Option<Vec<String>>,
  /// Use the larger result limit.
  pub more:       bool,
}

/// Parameters for [`LinkStore::top_contributors`].
#[derive(Debug, Clone, Default)]
pub struct ContributorsRequest {
  pub categories: Option<Vec<String>>,
  pub period:     Option<String>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Read and recompute operations over the link index.
///
/// Link, tag and summary rows are written elsewhere; a store only reads them
/// and rewrites the two derived link columns (global categories and global
/// summary).
pub trait LinkStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Listings ──────────────────────────────────────────────────────────

  /// Links ranked by likes, then summaries, then newest.
  fn top_links(
    &self,
    request: TopLinksRequest,
  ) -> impl Future<Output = Result<Page<LinkView>, Self::Error>> + Send + '_;

  /// A link with its ranked tags and, for a signed-in viewer, their own tag.
  fn link_tag_page(
    &self,
    link_id: i64,
    viewer: Option<Uuid>,
  ) -> impl Future<Output = Result<TagPage, Self::Error>> + Send + '_;

  /// A user's submitted, copied and tagged links with category facets.
  ///
  /// Fails with a not-found error before issuing any section query if the
  /// owner does not exist.
  fn treasure_map(
    &self,
    request: TreasureMapRequest,
  ) -> impl Future<Output = Result<TreasureMap, Self::Error>> + Send + '_;

  // ── Derived columns ───────────────────────────────────────────────────

  /// Recompute the consensus category string of a link, writing it back
  /// only if it changed.
  fn recompute_global_categories(
    &self,
    link_id: i64,
  ) -> impl Future<Output = Result<Recomputed, Self::Error>> + Send + '_;

  /// Recompute the most-liked summary of a link, writing it back only if it
  /// changed.
  fn recompute_global_summary(
    &self,
    link_id: i64,
  ) -> impl Future<Output = Result<Recomputed, Self::Error>> + Send + '_;

  // ── Aggregates ────────────────────────────────────────────────────────

  /// Global category usage counts.
  fn top_categories(
    &self,
    request: CategoryCountsRequest,
  ) -> impl Future<Output = Result<Vec<CatCount>, Self::Error>> + Send + '_;

  /// Users ranked by links submitted.
  fn top_contributors(
    &self,
    request: ContributorsRequest,
  ) -> impl Future<Output = Result<Vec<Contributor>, Self::Error>> + Send + '_;

  /// Global categories starting with `prefix`, most used first, skipping
  /// any in `selected`.
  fn suggest_categories(
    &self,
    prefix: String,
    selected: Vec<String>,
  ) -> impl Future<Output = Result<Vec<CatCount>, Self::Error>> + Send + '_;
}
