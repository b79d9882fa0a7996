//! Category sets and category facet counts.
//!
//! Categories are stored denormalised as a comma-joined string. Matching is
//! case-insensitive; display keeps the case the tagger typed, except in
//! global state where everything is lower-cased.

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{Error, Result, limits::Limits};

/// Separator between categories in a stored category string.
pub const SEPARATOR: char = ',';

/// Split a stored category string into its non-empty categories.
pub fn split_categories(field: &str) -> impl Iterator<Item = &str> {
  field.split(SEPARATOR).filter(|c| !c.is_empty())
}

// ─── CategorySet ─────────────────────────────────────────────────────────────

/// A normalised, alphabetised, duplicate-free list of categories.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CategorySet(Vec<String>);

impl CategorySet {
  /// Validate a user-submitted category string (as stored on a tag).
  ///
  /// Case is preserved; ordering is alphabetical, ignoring case.
  pub fn parse(raw: &str, limits: &Limits) -> Result<Self> {
    let invalid = |reason: String| Error::InvalidCategories {
      input: raw.to_owned(),
      reason,
    };

    let mut cats: Vec<String> = Vec::new();
    for cat in raw.split(SEPARATOR).map(str::trim) {
      if cat.is_empty() {
        return Err(invalid("empty category".into()));
      }
      if cat.chars().count() > limits.max_category_chars {
        return Err(invalid(format!(
          "category {cat:?} is longer than {} characters",
          limits.max_category_chars
        )));
      }
      if cats.iter().any(|c| c.eq_ignore_ascii_case(cat)) {
        return Err(invalid(format!("duplicate category {cat:?}")));
      }
      cats.push(cat.to_owned());
    }

    if cats.len() > limits.max_categories_per_tag {
      return Err(invalid(format!(
        "too many categories ({} max)",
        limits.max_categories_per_tag
      )));
    }

    cats.sort_by_key(|c| c.to_lowercase());
    Ok(Self(cats))
  }

  /// Build the category set for a listing filter.
  ///
  /// The set must be non-empty; entries are lower-cased and deduplicated.
  pub fn filter<S: AsRef<str>>(cats: &[S]) -> Result<Self> {
    let input = || {
      cats
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(",")
    };

    if cats.is_empty() {
      return Err(Error::InvalidFilter {
        input:  input(),
        reason: "no categories provided",
      });
    }

    let mut set: Vec<String> = Vec::with_capacity(cats.len());
    for cat in cats {
      let cat = cat.as_ref().trim();
      if cat.is_empty() {
        return Err(Error::InvalidFilter {
          input:  input(),
          reason: "empty category",
        });
      }
      if cat.contains(SEPARATOR) {
        return Err(Error::InvalidFilter {
          input:  input(),
          reason: "categories must not contain a comma",
        });
      }
      set.push(cat.to_lowercase());
    }

    set.sort();
    set.dedup();
    Ok(Self(set))
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> { self.0.iter().map(String::as_str) }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn as_slice(&self) -> &[String] { &self.0 }

  /// Case-insensitive membership.
  pub fn contains(&self, cat: &str) -> bool {
    let cat = cat.to_lowercase();
    self.0.iter().any(|c| c.to_lowercase() == cat)
  }

  pub fn into_vec(self) -> Vec<String> { self.0 }
}

impl fmt::Display for CategorySet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0.join(","))
  }
}

// ─── Facet counts ────────────────────────────────────────────────────────────

/// A category and how many records carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatCount {
  pub category: String,
  pub count:    u32,
}

impl CatCount {
  pub fn new(category: impl Into<String>, count: u32) -> Self {
    Self { category: category.into(), count }
  }
}

/// Highest count first; ties broken alphabetically.
pub fn sort_and_limit(counts: &mut Vec<CatCount>, limit: usize) {
  counts.sort_by(|a, b| {
    b.count
      .cmp(&a.count)
      .then_with(|| a.category.cmp(&b.category))
  });
  counts.truncate(limit);
}

/// Count categories across a collection of stored category strings.
///
/// Categories in `omit` are skipped, so a filtered view only offers facets
/// that narrow it further. Keys are lower-cased.
pub fn count_categories<'a>(
  fields: impl IntoIterator<Item = &'a str>,
  omit: Option<&CategorySet>,
  limit: usize,
) -> Vec<CatCount> {
  let mut tally: HashMap<String, u32> = HashMap::new();

  for field in fields {
    for cat in split_categories(field) {
      let cat = cat.to_lowercase();
      if omit.is_some_and(|o| o.contains(&cat)) {
        continue;
      }
      *tally.entry(cat).or_default() += 1;
    }
  }

  let mut counts: Vec<CatCount> = tally
    .into_iter()
    .map(|(category, count)| CatCount { category, count })
    .collect();
  sort_and_limit(&mut counts, limit);
  counts
}
