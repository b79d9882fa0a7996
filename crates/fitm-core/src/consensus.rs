//! Category consensus: reducing many independent tags on a link to one
//! global category set.
//!
//! Each tag is weighted by how much of the link's lifetime its current value
//! has stood unchanged, square-rooted so that a very old tag cannot drown out
//! newer ones. Scores accumulate per lower-cased category and every category
//! scoring at least half of the leader is admitted.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::split_categories;

/// Fraction of the leading category's score another category must reach.
pub const ADMISSION_THRESHOLD: f64 = 0.5;

/// `(now - last_updated) / (now - link_submitted)`.
///
/// A link with no measurable age yields `1.0`, so a tag written in the same
/// instant as its link counts fully. Negative ratios (a tag stamped after
/// `now`) are floored at zero.
pub fn lifespan_ratio(
  now: DateTime<Utc>,
  link_submitted: DateTime<Utc>,
  last_updated: DateTime<Utc>,
) -> f64 {
  let link_age = (now - link_submitted).num_microseconds().unwrap_or(i64::MAX);
  if link_age <= 0 {
    return 1.0;
  }
  let tag_age = (now - last_updated).num_microseconds().unwrap_or(i64::MAX);
  (tag_age as f64 / link_age as f64).max(0.0)
}

/// The weight one tag contributes to each of its categories.
pub fn overlap_score(
  now: DateTime<Utc>,
  link_submitted: DateTime<Utc>,
  last_updated: DateTime<Utc>,
) -> f64 {
  lifespan_ratio(now, link_submitted, last_updated).sqrt()
}

/// The two timestamps a tag's score depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagTiming {
  pub link_submitted: DateTime<Utc>,
  pub last_updated:   DateTime<Utc>,
}

impl TagTiming {
  pub fn score(&self, now: DateTime<Utc>) -> f64 {
    overlap_score(now, self.link_submitted, self.last_updated)
  }
}

// ─── Accumulator ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Consensus {
  scores:    BTreeMap<String, f64>,
  max_score: f64,
}

impl Consensus {
  pub fn new() -> Self { Self::default() }

  /// Add one tag's categories at the given weight.
  ///
  /// Categories are lower-cased; repeats within the same tag count once.
  pub fn add(&mut self, categories: &str, score: f64) {
    let cats: BTreeSet<String> =
      split_categories(categories).map(str::to_lowercase).collect();

    for cat in cats {
      let total = self.scores.entry(cat).or_default();
      *total += score;
      if *total > self.max_score {
        self.max_score = *total;
      }
    }
  }

  pub fn score(&self, category: &str) -> Option<f64> {
    self.scores.get(&category.to_lowercase()).copied()
  }

  pub fn max_score(&self) -> f64 { self.max_score }

  /// Categories reaching the threshold, alphabetised.
  pub fn admitted(&self) -> impl Iterator<Item = &str> {
    let floor = self.max_score * ADMISSION_THRESHOLD;
    self
      .scores
      .iter()
      .filter(move |(_, score)| **score >= floor)
      .map(|(cat, _)| cat.as_str())
  }

  /// The comma-joined global category string. Empty when nothing was added.
  pub fn global_categories(&self) -> String {
    self.admitted().collect::<Vec<_>>().join(",")
  }
}

impl<S: AsRef<str>> FromIterator<(S, f64)> for Consensus {
  fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
    let mut consensus = Self::new();
    for (cats, score) in iter {
      consensus.add(cats.as_ref(), score);
    }
    consensus
  }
}

// ─── Global summary ──────────────────────────────────────────────────────────

/// A user summary of a link with its like count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryCandidate {
  pub text:  String,
  pub likes: u32,
}

/// The most-liked summary; ties go to the lexically smallest text.
pub fn pick_global_summary(candidates: &[SummaryCandidate]) -> String {
  candidates
    .iter()
    .min_by(|a, b| b.likes.cmp(&a.likes).then_with(|| a.text.cmp(&b.text)))
    .map(|c| c.text.clone())
    .unwrap_or_default()
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// Result of recomputing a derived link column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Recomputed {
  /// The stored value already matched; nothing was written.
  Unchanged { value: String },
  Updated { previous: String, current: String },
}

impl Recomputed {
  pub fn from_values(previous: String, current: String) -> Self {
    if previous == current {
      Self::Unchanged { value: current }
    } else {
      Self::Updated { previous, current }
    }
  }

  pub fn value(&self) -> &str {
    match self {
      Self::Unchanged { value } => value,
      Self::Updated { current, .. } => current,
    }
  }

  pub fn is_updated(&self) -> bool { matches!(self, Self::Updated { .. }) }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;

  fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() }

  #[test]
  fn threshold_is_half_the_leader() {
    let c: Consensus = [("a", 10.0), ("b", 10.0), ("c", 4.0)].into_iter().collect();
    assert_eq!(c.max_score(), 10.0);
    assert_eq!(c.global_categories(), "a,b");
  }

  #[test]
  fn exactly_half_is_admitted() {
    let c: Consensus = [("a", 10.0), ("b", 5.0)].into_iter().collect();
    assert_eq!(c.global_categories(), "a,b");
  }

  #[test]
  fn single_tag_yields_its_categories() {
    let mut c = Consensus::new();
    c.add("Zines,Art", 0.01);
    assert_eq!(c.global_categories(), "art,zines");
  }

  #[test]
  fn zero_tags_yield_empty() {
    assert_eq!(Consensus::new().global_categories(), "");
  }

  #[test]
  fn duplicate_categories_in_one_tag_count_once() {
    let mut c = Consensus::new();
    c.add("rust,Rust", 1.0);
    c.add("go", 1.0);
    assert_eq!(c.score("rust"), Some(1.0));
    assert_eq!(c.global_categories(), "go,rust");
  }

  #[test]
  fn boosting_existing_categories_never_removes_one() {
    let base = [("a,b", 3.0), ("a", 1.0), ("c", 2.0)];
    let before: Consensus = base.into_iter().collect();
    let admitted: Vec<String> = before.admitted().map(String::from).collect();
    assert_eq!(admitted, ["a", "b", "c"]);

    let mut after = before.clone();
    after.add("a,b,c", 1.5);
    for cat in &admitted {
      assert!(after.admitted().any(|c| c == cat), "{cat} was dropped");
    }
  }

  #[test]
  fn ratio_handles_zero_link_age() {
    assert_eq!(lifespan_ratio(t0(), t0(), t0()), 1.0);
  }

  #[test]
  fn ratio_floors_future_tags() {
    let now = t0() + Duration::days(10);
    let future = now + Duration::days(1);
    assert_eq!(lifespan_ratio(now, t0(), future), 0.0);
  }

  #[test]
  fn tag_at_link_creation_scores_one() {
    let now = t0() + Duration::days(60);
    assert!((overlap_score(now, t0(), t0()) - 1.0).abs() < 1e-9);
  }

  #[test]
  fn retro_gaming_scenario() {
    // Link and tag A at T0, tag B at T0+30d, queried at T0+60d.
    let now = t0() + Duration::days(60);
    let a = TagTiming { link_submitted: t0(), last_updated: t0() };
    let b = TagTiming {
      link_submitted: t0(),
      last_updated:   t0() + Duration::days(30),
    };

    let (sa, sb) = (a.score(now), b.score(now));
    assert!((sa - 1.0).abs() < 1e-9);
    assert!((sb - 0.5f64.sqrt()).abs() < 1e-9);

    let c: Consensus = [("retro,gaming", sa), ("gaming", sb)].into_iter().collect();
    let gaming = c.score("gaming").unwrap();
    let retro = c.score("retro").unwrap();
    assert!((gaming - (sa + sb)).abs() < 1e-9);
    assert_eq!(retro >= gaming * ADMISSION_THRESHOLD, c.admitted().any(|x| x == "retro"));
    assert!(c.admitted().any(|x| x == "gaming"));
    assert_eq!(c.global_categories(), "gaming,retro");
  }

  #[test]
  fn most_liked_summary_wins() {
    let candidates = vec![
      SummaryCandidate { text: "b".into(), likes: 3 },
      SummaryCandidate { text: "a".into(), likes: 1 },
      SummaryCandidate { text: "c".into(), likes: 3 },
    ];
    assert_eq!(pick_global_summary(&candidates), "b");
    assert_eq!(pick_global_summary(&[]), "");
  }

  #[test]
  fn recomputed_classifies_change() {
    assert!(!Recomputed::from_values("a".into(), "a".into()).is_updated());
    let r = Recomputed::from_values("a".into(), "a,b".into());
    assert!(r.is_updated());
    assert_eq!(r.value(), "a,b");
  }
}
