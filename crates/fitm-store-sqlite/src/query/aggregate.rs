//! Aggregate queries over consensus categories and submitters.

use fitm_core::{category::CategorySet, period::Period};

use super::{
  QueryContext, RenderedQuery, SqlWriter,
  listing::{Predicate, write_where},
  matching::{CategoryColumn, prefix_pattern},
};

fn link_predicates(filter: Option<&CategorySet>, period: Option<Period>) -> Vec<Predicate> {
  let mut predicates = Vec::new();
  if let Some(filter) = filter {
    predicates.push(Predicate::HasCategories {
      column:     CategoryColumn::Global,
      categories: filter.as_slice().to_vec(),
    });
  }
  if let Some(period) = period {
    predicates.push(Predicate::SubmittedWithin(period));
  }
  predicates
}

/// Recursive CTE `Split(link_id, cat, rest)` yielding one row per consensus
/// category of every link matching `predicates`.
fn write_split(w: &mut SqlWriter, predicates: &[Predicate], ctx: &QueryContext) {
  w.push(
    "WITH RECURSIVE Split(link_id, cat, rest) AS (
    SELECT l.id, '', LOWER(COALESCE(l.global_cats, '')) || ','
    FROM Links l",
  );
  write_where(w, predicates, ctx);
  w.push(
    "
    UNION ALL
    SELECT link_id, substr(rest, 1, instr(rest, ',') - 1), substr(rest, instr(rest, ',') + 1)
    FROM Split
    WHERE rest != ''
)",
  );
}

fn write_omit(w: &mut SqlWriter, omit: &[String]) {
  if !omit.is_empty() {
    w.push("\n  AND cat NOT IN (").bind_list(omit.iter().cloned()).push(")");
  }
}

/// Consensus category usage counts, optionally restricted to links carrying
/// every category in `filter` (which are then left out of the counts).
pub fn category_counts(
  ctx: &QueryContext,
  filter: Option<&CategorySet>,
  period: Option<Period>,
  limit: u32,
) -> RenderedQuery {
  let mut w = SqlWriter::new();
  write_split(&mut w, &link_predicates(filter, period), ctx);
  w.push("\nSELECT cat, COUNT(DISTINCT link_id) AS count\nFROM Split\nWHERE cat != ''");
  if let Some(filter) = filter {
    write_omit(&mut w, filter.as_slice());
  }
  w.push("\nGROUP BY cat\nORDER BY count DESC, cat ASC\nLIMIT ").bind(limit);
  w.finish()
}

/// Submitters ranked by how many matching links they submitted.
pub fn contributors(
  ctx: &QueryContext,
  filter: Option<&CategorySet>,
  period: Option<Period>,
  limit: u32,
) -> RenderedQuery {
  let mut w = SqlWriter::new();
  w.push("SELECT l.submitted_by, COUNT(*) AS links_submitted\nFROM Links l");
  write_where(&mut w, &link_predicates(filter, period), ctx);
  w.push("\nGROUP BY l.submitted_by\nORDER BY links_submitted DESC, l.submitted_by ASC\nLIMIT ")
    .bind(limit);
  w.finish()
}

/// Consensus categories beginning with `prefix`, most used first.
pub fn suggestions(
  ctx: &QueryContext,
  prefix: &str,
  omit: &[String],
  limit: u32,
) -> RenderedQuery {
  let mut w = SqlWriter::new();
  write_split(&mut w, &[], ctx);
  w.push("\nSELECT cat, COUNT(DISTINCT link_id) AS count\nFROM Split\nWHERE cat != ''")
    .push("\n  AND cat LIKE ")
    .bind(prefix_pattern(prefix))
    .push(" ESCAPE '\\'");
  write_omit(&mut w, omit);
  w.push("\nGROUP BY cat\nORDER BY count DESC, cat ASC\nLIMIT ").bind(limit);
  w.finish()
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use rusqlite::types::Value;

  use super::*;
  use crate::query::CategoryMatching;

  fn ctx() -> QueryContext {
    QueryContext {
      matching:  CategoryMatching::Like,
      page_size: 20,
      now:       Utc::now(),
    }
  }

  #[test]
  fn filter_categories_are_omitted_from_counts() {
    let filter = CategorySet::filter(&["x", "y"]).unwrap();
    let q = category_counts(&ctx(), Some(&filter), None, 20);
    assert!(q.sql.contains("cat NOT IN (?, ?)"));
    assert_eq!(q.sql.matches('?').count(), q.params.len());
    assert_eq!(q.params.last(), Some(&Value::Integer(20)));
  }

  #[test]
  fn unfiltered_counts_have_no_where_on_links() {
    let q = category_counts(&ctx(), None, None, 100);
    assert!(!q.sql.contains("FROM Links l\nWHERE"));
    assert_eq!(q.params, vec![Value::Integer(100)]);
  }

  #[test]
  fn contributors_bind_period_cutoff() {
    let q = contributors(&ctx(), None, Some(Period::Day), 10);
    assert!(q.sql.contains("l.submit_date > ?"));
    assert_eq!(q.params.len(), 2);
  }

  #[test]
  fn suggestions_escape_the_prefix() {
    let q = suggestions(&ctx(), "50%", &["500".into()], 3);
    assert_eq!(q.params[0], Value::Text("50\\%%".into()));
    assert_eq!(q.params[1], Value::Text("500".into()));
  }
}
