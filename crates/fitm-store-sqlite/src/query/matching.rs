//! Category membership predicates.
//!
//! A category matches when it appears as a whole entry in a comma-joined
//! category string, ignoring case. `Like` checks this with a delimited
//! `LIKE` pattern; `FullText` first narrows candidates through the FTS5 side
//! indexes and then applies the same delimited check, since the tokenizer
//! does not respect category boundaries.

use serde::Deserialize;

use super::SqlWriter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryMatching {
  #[default]
  Like,
  FullText,
}

/// Which category string a predicate inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CategoryColumn {
  /// The link's consensus categories.
  Global,
  /// The owner's own tag if they have one, else the consensus categories.
  Shown,
}

impl CategoryColumn {
  pub fn expr(self) -> &'static str {
    match self {
      Self::Global => "COALESCE(l.global_cats, '')",
      Self::Shown => "COALESCE(ot.categories, l.global_cats, '')",
    }
  }
}

/// Escape `LIKE` wildcards; pair with `ESCAPE '\'`.
fn escape_like(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  for c in raw.chars() {
    if matches!(c, '\\' | '%' | '_') {
      out.push('\\');
    }
    out.push(c);
  }
  out
}

/// Pattern matching `cat` as a whole entry of a `,`-wrapped string.
pub fn delimited_pattern(cat: &str) -> String {
  format!("%,{},%", escape_like(&cat.to_lowercase()))
}

/// Pattern matching any string starting with `prefix`.
pub fn prefix_pattern(prefix: &str) -> String {
  format!("{}%", escape_like(&prefix.to_lowercase()))
}

/// An FTS5 query requiring every category as a quoted phrase.
///
/// Categories with nothing the tokenizer would index are left to the
/// delimited check. Returns `None` when no phrase remains.
pub fn fts_query(cats: &[String]) -> Option<String> {
  let phrases: Vec<String> = cats
    .iter()
    .filter(|c| c.chars().any(char::is_alphanumeric))
    .map(|c| format!("\"{}\"", c.replace('"', "\"\"")))
    .collect();

  if phrases.is_empty() {
    None
  } else {
    Some(phrases.join(" AND "))
  }
}

fn write_delimited(w: &mut SqlWriter, column: CategoryColumn, cat: &str, negate: bool) {
  w.push("',' || LOWER(")
    .push(column.expr())
    .push(") || ','")
    .push(if negate { " NOT LIKE " } else { " LIKE " })
    .bind(delimited_pattern(cat))
    .push(" ESCAPE '\\'");
}

impl CategoryMatching {
  /// Require every category in `cats` to be present in `column`.
  pub fn write_all_of(self, w: &mut SqlWriter, column: CategoryColumn, cats: &[String]) {
    w.push("(");

    let narrowing = match self {
      Self::Like => None,
      Self::FullText => fts_query(cats),
    };

    if let Some(query) = narrowing {
      match column {
        CategoryColumn::Global => {
          w.push("l.id IN (SELECT link_id FROM global_cats_fts WHERE global_cats_fts MATCH ")
            .bind(query)
            .push(")");
        }
        CategoryColumn::Shown => {
          w.push("(l.id IN (SELECT link_id FROM global_cats_fts WHERE global_cats_fts MATCH ")
            .bind(query.clone())
            .push(") OR ot.id IN (SELECT tag_id FROM tag_cats_fts WHERE tag_cats_fts MATCH ")
            .bind(query)
            .push("))");
        }
      }
      w.push(" AND ");
    }

    for (i, cat) in cats.iter().enumerate() {
      if i > 0 {
        w.push(" AND ");
      }
      write_delimited(w, column, cat, false);
    }

    w.push(")");
  }

  /// Require `cat` to be absent from `column`.
  pub fn write_none_of(self, w: &mut SqlWriter, column: CategoryColumn, cat: &str) {
    write_delimited(w, column, cat, true);
  }
}

#[cfg(test)]
mod tests {
  use rusqlite::types::Value;

  use super::*;

  #[test]
  fn wildcards_are_escaped() {
    assert_eq!(delimited_pattern("100%_Real"), "%,100\\%\\_real,%");
    assert_eq!(prefix_pattern("a\\b"), "a\\\\b%");
  }

  #[test]
  fn fts_query_quotes_phrases() {
    let cats = vec!["say \"hi\"".to_owned(), "retro".to_owned()];
    assert_eq!(fts_query(&cats).unwrap(), "\"say \"\"hi\"\"\" AND \"retro\"");
  }

  #[test]
  fn fts_query_skips_unindexable_categories() {
    assert_eq!(fts_query(&["+++".to_owned()]), None);
    assert_eq!(fts_query(&["+++".to_owned(), "c".to_owned()]).unwrap(), "\"c\"");
  }

  #[test]
  fn like_binds_one_pattern_per_category() {
    let mut w = SqlWriter::new();
    CategoryMatching::Like.write_all_of(
      &mut w,
      CategoryColumn::Global,
      &["a".to_owned(), "b".to_owned()],
    );
    let q = w.finish();
    assert_eq!(q.sql.matches(" LIKE ?").count(), 2);
    assert_eq!(q.params, vec![
      Value::Text("%,a,%".into()),
      Value::Text("%,b,%".into()),
    ]);
  }

  #[test]
  fn full_text_narrows_then_checks_boundaries() {
    let mut w = SqlWriter::new();
    CategoryMatching::FullText.write_all_of(&mut w, CategoryColumn::Shown, &["a".to_owned()]);
    let q = w.finish();
    assert!(q.sql.contains("global_cats_fts MATCH ?"));
    assert!(q.sql.contains("tag_cats_fts MATCH ?"));
    assert!(q.sql.contains(" LIKE ?"));
    assert_eq!(q.params.len(), 3);
  }
}
