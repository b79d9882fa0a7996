//! Link listings: the base intents and the stages applied to them.

use fitm_core::{Error, Result, category::CategorySet, period::Period};
use uuid::Uuid;

use super::{
  QueryContext, RenderedQuery, SqlWriter,
  matching::{CategoryColumn, CategoryMatching},
};
use crate::encode::{encode_dt, encode_uuid};

// ─── Listing intents ─────────────────────────────────────────────────────────

/// What is being listed, before any filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
  /// All links; the only listing that paginates by default.
  TopLinks,
  /// A single link, for its tag page.
  Link(i64),
  /// Links the owner submitted.
  Submitted { owner: String },
  /// Links the owner copied and did not submit.
  Copied { owner: String },
  /// Links the owner tagged, did not submit and did not copy.
  Tagged { owner: String },
}

impl Listing {
  fn owner(&self) -> Option<&str> {
    match self {
      Self::Submitted { owner } | Self::Copied { owner } | Self::Tagged { owner } => {
        Some(owner.as_str())
      }
      Self::TopLinks | Self::Link(_) => None,
    }
  }

  fn category_column(&self) -> CategoryColumn {
    match self.owner() {
      Some(_) => CategoryColumn::Shown,
      None => CategoryColumn::Global,
    }
  }

  fn base_predicates(&self) -> Vec<Predicate> {
    match self {
      Self::TopLinks => vec![],
      Self::Link(id) => vec![Predicate::LinkId(*id)],
      Self::Submitted { owner } => vec![Predicate::SubmittedBy(owner.clone())],
      Self::Copied { owner } => vec![Predicate::NotSubmittedBy(owner.clone())],
      Self::Tagged { owner } => vec![
        Predicate::NotSubmittedBy(owner.clone()),
        Predicate::NotCopiedByOwner,
      ],
    }
  }
}

// ─── Predicates ──────────────────────────────────────────────────────────────

/// One `WHERE` term. Terms are sorted and deduplicated before rendering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Predicate {
  LinkId(i64),
  SubmittedBy(String),
  NotSubmittedBy(String),
  /// Requires the owner CTEs.
  NotCopiedByOwner,
  HasCategories {
    column:     CategoryColumn,
    categories: Vec<String>,
  },
  LacksGlobalCategory(String),
  SubmittedWithin(Period),
}

impl Predicate {
  pub(crate) fn write(&self, w: &mut SqlWriter, ctx: &QueryContext) {
    match self {
      Self::LinkId(id) => {
        w.push("l.id = ").bind(*id);
      }
      Self::SubmittedBy(login) => {
        w.push("l.submitted_by = ").bind(login.clone());
      }
      Self::NotSubmittedBy(login) => {
        w.push("l.submitted_by != ").bind(login.clone());
      }
      Self::NotCopiedByOwner => {
        w.push("l.id NOT IN (SELECT link_id FROM OwnerCopies)");
      }
      Self::HasCategories { column, categories } => {
        ctx.matching.write_all_of(w, *column, categories);
      }
      Self::LacksGlobalCategory(cat) => {
        CategoryMatching::Like.write_none_of(w, CategoryColumn::Global, cat);
      }
      Self::SubmittedWithin(period) => {
        w.push("l.submit_date > ").bind(encode_dt(period.cutoff(ctx.now)));
      }
    }
  }
}

/// Write `WHERE a AND b ...` for a sorted, deduplicated predicate list.
pub(crate) fn write_where(w: &mut SqlWriter, predicates: &[Predicate], ctx: &QueryContext) {
  let mut sorted: Vec<&Predicate> = predicates.iter().collect();
  sorted.sort();
  sorted.dedup();

  for (i, predicate) in sorted.into_iter().enumerate() {
    w.push(if i == 0 { "\nWHERE " } else { "\n  AND " });
    predicate.write(w, ctx);
  }
}

// ─── Stages ──────────────────────────────────────────────────────────────────

/// An independent transformation of a listing query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
  /// Keep links carrying every category. Fails on an empty list.
  CategoryFilter(Vec<String>),
  /// Keep links submitted within the window. Fails on unknown tokens,
  /// including `all`.
  PeriodFilter(String),
  /// Add per-viewer flags. `None` leaves the query unchanged.
  ViewerAugmentation(Option<Uuid>),
  /// 0 for the unpaginated first page, otherwise a 1-based page number.
  Paginate(u32),
  /// Drop links whose consensus categories include this one.
  ExcludeCategory(String),
}

// ─── Query ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LinkQuery {
  listing:    Listing,
  ctx:        QueryContext,
  predicates: Vec<Predicate>,
  viewer:     Option<Uuid>,
  page:       Option<u32>,
  error:      Option<Error>,
}

impl LinkQuery {
  pub fn new(listing: Listing, ctx: QueryContext) -> Self {
    let error = match listing.owner() {
      Some(owner) if owner.trim().is_empty() => Some(Error::MissingIdentity("owner login name")),
      _ => None,
    };

    Self {
      predicates: listing.base_predicates(),
      listing,
      ctx,
      viewer: None,
      page: None,
      error,
    }
  }

  /// Apply a stage. After the first failure further stages are ignored and
  /// [`render`](Self::render) reports that failure.
  pub fn apply(mut self, stage: Stage) -> Self {
    if self.error.is_some() {
      return self;
    }

    match stage {
      Stage::CategoryFilter(cats) => match CategorySet::filter(&cats) {
        Ok(set) => self.predicates.push(Predicate::HasCategories {
          column:     self.listing.category_column(),
          categories: set.into_vec(),
        }),
        Err(e) => self.error = Some(e),
      },
      Stage::PeriodFilter(token) => match Period::parse(&token) {
        Ok(period) => self.predicates.push(Predicate::SubmittedWithin(period)),
        Err(e) => self.error = Some(e),
      },
      Stage::ViewerAugmentation(viewer) => {
        if viewer.is_some() {
          self.viewer = viewer;
        }
      }
      Stage::Paginate(page) => self.page = Some(page),
      Stage::ExcludeCategory(cat) => {
        self.predicates.push(Predicate::LacksGlobalCategory(cat.to_lowercase()));
      }
    }
    self
  }

  pub fn stages(self, stages: impl IntoIterator<Item = Stage>) -> Self {
    stages.into_iter().fold(self, Self::apply)
  }

  /// Whether rows carry `cats_from_user`.
  pub fn has_owner_columns(&self) -> bool { self.listing.owner().is_some() }

  /// Whether rows carry the viewer flags.
  pub fn has_viewer_columns(&self) -> bool { self.viewer.is_some() }

  pub fn page(&self) -> Option<u32> { self.page }

  pub fn render(&self) -> Result<RenderedQuery> {
    if let Some(e) = &self.error {
      return Err(e.clone());
    }

    let mut w = SqlWriter::new();
    self.write_ctes(&mut w);
    self.write_fields(&mut w);
    self.write_from(&mut w);
    write_where(&mut w, &self.predicates, &self.ctx);
    w.push("\nGROUP BY l.id");
    w.push("\nORDER BY like_count DESC, summary_count DESC, link_id DESC");

    if let Some(page) = self.page {
      let (limit, offset) = fitm_core::page::window(page, self.ctx.page_size);
      w.push("\nLIMIT ").bind(limit).push(" OFFSET ").bind(offset);
    }

    Ok(w.finish())
  }

  fn write_ctes(&self, w: &mut SqlWriter) {
    w.push(
      "WITH LikeCount AS (
    SELECT link_id, COUNT(*) AS like_count FROM \"Link Likes\" GROUP BY link_id
),
SummaryCount AS (
    SELECT link_id, COUNT(*) AS summary_count FROM Summaries GROUP BY link_id
),
TagCount AS (
    SELECT link_id, COUNT(*) AS tag_count FROM Tags GROUP BY link_id
)",
    );

    if let Some(owner) = self.listing.owner() {
      w.push(",\nOwnerTags AS (\n    SELECT id, link_id, categories FROM Tags WHERE submitted_by = ")
        .bind(owner.to_owned())
        .push(
          "\n),\nOwnerSummaries AS (
    SELECT s.link_id, MAX(s.text) AS text
    FROM Summaries s
    INNER JOIN Users u ON u.id = s.submitted_by
    WHERE u.login_name = ",
        )
        .bind(owner.to_owned())
        .push(
          "\n    GROUP BY s.link_id
),
OwnerCopies AS (
    SELECT DISTINCT c.link_id
    FROM \"Link Copies\" c
    INNER JOIN Users u ON u.id = c.user_id
    WHERE u.login_name = ",
        )
        .bind(owner.to_owned())
        .push("\n)");
    }

    if let Some(viewer) = self.viewer {
      let viewer = encode_uuid(viewer);
      w.push(",\nIsLiked AS (\n    SELECT link_id, COUNT(*) AS n FROM \"Link Likes\" WHERE user_id = ")
        .bind(viewer.clone())
        .push(
          " GROUP BY link_id\n),\nIsCopied AS (\n    SELECT link_id, COUNT(*) AS n FROM \"Link Copies\" WHERE user_id = ",
        )
        .bind(viewer.clone())
        .push(
          " GROUP BY link_id
),
IsTagged AS (
    SELECT t.link_id, COUNT(*) AS n
    FROM Tags t
    INNER JOIN Users u ON u.login_name = t.submitted_by
    WHERE u.id = ",
        )
        .bind(viewer)
        .push(" GROUP BY t.link_id\n)");
    }
  }

  fn write_fields(&self, w: &mut SqlWriter) {
    let owner = self.has_owner_columns();

    w.push("\nSELECT\n    l.id AS link_id,\n    l.url AS url,\n    l.submitted_by AS submitted_by,\n    l.submit_date AS submit_date,\n    ")
      .push(self.listing.category_column().expr())
      .push(" AS cats,\n    ")
      .push(if owner {
        "COALESCE(os.text, l.global_summary, '')"
      } else {
        "COALESCE(l.global_summary, '')"
      })
      .push(
        " AS summary,
    COALESCE(sc.summary_count, 0) AS summary_count,
    COALESCE(tc.tag_count, 0) AS tag_count,
    COALESCE(lc.like_count, 0) AS like_count,
    l.img_url AS img_url",
      );

    if owner {
      w.push(",\n    ot.id IS NOT NULL AS cats_from_user");
    }
    if self.has_viewer_columns() {
      w.push(
        ",
    COALESCE(il.n, 0) > 0 AS is_liked,
    COALESCE(ic.n, 0) > 0 AS is_copied,
    COALESCE(it.n, 0) > 0 AS is_tagged",
      );
    }
  }

  fn write_from(&self, w: &mut SqlWriter) {
    w.push(
      "\nFROM Links l
LEFT JOIN LikeCount lc ON lc.link_id = l.id
LEFT JOIN SummaryCount sc ON sc.link_id = l.id
LEFT JOIN TagCount tc ON tc.link_id = l.id",
    );

    match &self.listing {
      Listing::Submitted { .. } => {
        w.push("\nLEFT JOIN OwnerTags ot ON ot.link_id = l.id");
      }
      Listing::Copied { .. } => {
        w.push("\nLEFT JOIN OwnerTags ot ON ot.link_id = l.id");
        w.push("\nINNER JOIN OwnerCopies oc ON oc.link_id = l.id");
      }
      Listing::Tagged { .. } => {
        w.push("\nINNER JOIN OwnerTags ot ON ot.link_id = l.id");
      }
      Listing::TopLinks | Listing::Link(_) => {}
    }
    if self.has_owner_columns() {
      w.push("\nLEFT JOIN OwnerSummaries os ON os.link_id = l.id");
    }

    if self.has_viewer_columns() {
      w.push(
        "\nLEFT JOIN IsLiked il ON il.link_id = l.id
LEFT JOIN IsCopied ic ON ic.link_id = l.id
LEFT JOIN IsTagged it ON it.link_id = l.id",
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use rusqlite::types::Value;

  use super::*;

  fn ctx() -> QueryContext {
    QueryContext {
      matching:  CategoryMatching::Like,
      page_size: 20,
      now:       Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
    }
  }

  fn stages() -> Vec<Stage> {
    vec![
      Stage::CategoryFilter(vec!["retro".into(), "Gaming".into()]),
      Stage::PeriodFilter("week".into()),
      Stage::ViewerAugmentation(Some(Uuid::from_u128(7))),
      Stage::Paginate(2),
    ]
  }

  fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    if items.len() <= 1 {
      return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for i in 0..items.len() {
      let mut rest = items.to_vec();
      let head = rest.remove(i);
      for mut tail in permutations(&rest) {
        tail.insert(0, head.clone());
        out.push(tail);
      }
    }
    out
  }

  #[test]
  fn stage_order_does_not_change_the_query() {
    for listing in [
      Listing::TopLinks,
      Listing::Tagged { owner: "ann".into() },
    ] {
      let expected = LinkQuery::new(listing.clone(), ctx())
        .stages(stages())
        .render()
        .unwrap();

      let orders = permutations(&stages());
      assert_eq!(orders.len(), 24);
      for order in orders {
        let rendered = LinkQuery::new(listing.clone(), ctx())
          .stages(order.clone())
          .render()
          .unwrap();
        assert_eq!(rendered, expected, "order {order:?}");
      }
    }
  }

  #[test]
  fn user_input_is_never_spliced() {
    let hostile = "x' OR 1=1; DROP TABLE Links; --";
    let q = LinkQuery::new(Listing::Submitted { owner: hostile.into() }, ctx())
      .apply(Stage::CategoryFilter(vec![hostile.into()]))
      .render()
      .unwrap();

    assert!(!q.sql.contains("DROP TABLE"));
    assert!(q.params.contains(&Value::Text(hostile.into())));
    assert_eq!(q.sql.matches('?').count(), q.params.len());
  }

  #[test]
  fn empty_category_filter_refuses_to_render() {
    let err = LinkQuery::new(Listing::TopLinks, ctx())
      .apply(Stage::CategoryFilter(vec![]))
      .render()
      .unwrap_err();
    assert!(matches!(err, Error::InvalidFilter { .. }));
  }

  #[test]
  fn first_error_wins() {
    let err = LinkQuery::new(Listing::TopLinks, ctx())
      .apply(Stage::PeriodFilter("all".into()))
      .apply(Stage::CategoryFilter(vec![]))
      .render()
      .unwrap_err();
    assert_eq!(err, Error::InvalidPeriod("all".into()));
  }

  #[test]
  fn blank_owner_is_rejected() {
    let err = LinkQuery::new(Listing::Copied { owner: " ".into() }, ctx())
      .render()
      .unwrap_err();
    assert!(matches!(err, Error::MissingIdentity(_)));
  }

  #[test]
  fn pagination_windows() {
    let first = LinkQuery::new(Listing::TopLinks, ctx())
      .apply(Stage::Paginate(0))
      .render()
      .unwrap();
    assert!(first.sql.ends_with("LIMIT ? OFFSET ?"));
    assert_eq!(first.params, vec![Value::Integer(21), Value::Integer(0)]);

    let third = LinkQuery::new(Listing::TopLinks, ctx())
      .apply(Stage::Paginate(3))
      .render()
      .unwrap();
    assert_eq!(third.params, vec![Value::Integer(21), Value::Integer(40)]);

    let unbounded = LinkQuery::new(Listing::Link(1), ctx()).render().unwrap();
    assert!(!unbounded.sql.contains("LIMIT"));
  }

  #[test]
  fn anonymous_viewer_is_a_no_op() {
    let plain = LinkQuery::new(Listing::TopLinks, ctx()).render().unwrap();
    let anon = LinkQuery::new(Listing::TopLinks, ctx())
      .apply(Stage::ViewerAugmentation(None))
      .render()
      .unwrap();
    assert_eq!(plain, anon);
    assert!(!plain.sql.contains("is_liked"));
  }

  #[test]
  fn where_clause_appears_once() {
    let q = LinkQuery::new(Listing::Tagged { owner: "ann".into() }, ctx())
      .stages(stages())
      .apply(Stage::ExcludeCategory("nsfw".into()))
      .render()
      .unwrap();
    assert_eq!(q.sql.matches("\nWHERE ").count(), 1);
    assert!(q.sql.contains("NOT IN (SELECT link_id FROM OwnerCopies)"));
  }
}
