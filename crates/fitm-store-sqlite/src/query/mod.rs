//! Query composition.
//!
//! Listings are described as a base [`Listing`] plus independent [`Stage`]s.
//! Stages only record predicates and options; SQL text is produced once, at
//! [`LinkQuery::render`], so the order stages were applied in never changes
//! the result. Every caller-supplied value is bound as a parameter.

mod aggregate;
mod listing;
mod matching;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;

pub use self::{
  aggregate::{category_counts, contributors, suggestions},
  listing::{LinkQuery, Listing, Predicate, Stage},
  matching::{CategoryColumn, CategoryMatching},
};

// ─── Rendered output ─────────────────────────────────────────────────────────

/// SQL text with positional `?` placeholders and their values, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
  pub sql:    String,
  pub params: Vec<Value>,
}

/// Accumulates SQL text and bound values side by side, so placeholders and
/// parameters can never drift out of step.
#[derive(Debug, Default)]
pub struct SqlWriter {
  sql:    String,
  params: Vec<Value>,
}

impl SqlWriter {
  pub fn new() -> Self { Self::default() }

  pub fn push(&mut self, sql: &str) -> &mut Self {
    self.sql.push_str(sql);
    self
  }

  /// Emit a `?` placeholder bound to `value`.
  pub fn bind(&mut self, value: impl Into<Value>) -> &mut Self {
    self.sql.push('?');
    self.params.push(value.into());
    self
  }

  /// Emit `?, ?, ...` for each value.
  pub fn bind_list<V: Into<Value>>(
    &mut self,
    values: impl IntoIterator<Item = V>,
  ) -> &mut Self {
    for (i, value) in values.into_iter().enumerate() {
      if i > 0 {
        self.sql.push_str(", ");
      }
      self.bind(value);
    }
    self
  }

  pub fn finish(self) -> RenderedQuery {
    RenderedQuery {
      sql:    self.sql,
      params: self.params,
    }
  }
}

// ─── Context ─────────────────────────────────────────────────────────────────

/// Store-wide settings every composed query renders against.
#[derive(Debug, Clone, Copy)]
pub struct QueryContext {
  pub matching:  CategoryMatching,
  pub page_size: u32,
  /// Anchor for period windows.
  pub now:       DateTime<Utc>,
}
