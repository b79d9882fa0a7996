//! [`SqliteStore`], the SQLite implementation of [`LinkStore`].

use std::{
  future::Future,
  path::Path,
  sync::Arc,
  time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use rusqlite::{InterruptHandle, OptionalExtension as _, Transaction, TransactionBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use fitm_core::{
  category::{CatCount, CategorySet},
  clock::{Clock, SystemClock},
  consensus::{Consensus, Recomputed, SummaryCandidate, TagTiming, pick_global_summary},
  limits::Limits,
  link::{Contributor, LinkView},
  page::Page,
  period::Period,
  store::{
    CategoryCountsRequest, ContributorsRequest, LinkStore, TopLinksRequest, TreasureMapRequest,
  },
  tag::{Tag, TagPage, TagRanking},
  tmap::{Profile, TreasureMap, TreasureMapSections},
};

use crate::{
  Error, Result,
  encode::{RawLink, RawProfile, RawTag, decode_dt, encode_uuid},
  query::{self, CategoryMatching, LinkQuery, Listing, QueryContext, RenderedQuery, Stage},
  schema::SCHEMA,
  settings::StoreSettings,
};

/// Consensus category hidden from listings unless the caller opts in.
pub const NSFW: &str = "nsfw";

/// When a bounded operation must be finished by.
#[derive(Debug, Clone, Copy)]
struct Expiry {
  limit: Duration,
  at:    Instant,
}

impl Expiry {
  fn passed(&self) -> bool { Instant::now() >= self.at }

  /// Fail inside a connection closure once the caller has been told the
  /// operation timed out.
  fn check(&self) -> Result<(), tokio_rusqlite::Error> {
    if self.passed() {
      return in_call(Err(Error::Timeout(self.limit)));
    }
    Ok(())
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A link index backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:      tokio_rusqlite::Connection,
  interrupt: Arc<InterruptHandle>,
  matching:  CategoryMatching,
  limits:    Limits,
  clock:     Arc<dyn Clock>,
  deadline:  Option<Duration>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store; useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  /// Open the store described by `settings`.
  pub async fn open_with(settings: &StoreSettings) -> Result<Self> {
    let mut store = Self::open(&settings.store_path)
      .await?
      .with_matching(settings.category_matching)
      .with_limits(settings.limits.clone());
    store.deadline = settings.deadline();
    Ok(store)
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let interrupt = conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(conn.get_interrupt_handle())
      })
      .await?;

    Ok(Self {
      conn,
      interrupt: Arc::new(interrupt),
      matching: CategoryMatching::default(),
      limits: Limits::default(),
      clock: Arc::new(SystemClock),
      deadline: None,
    })
  }

  pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
    self.clock = Arc::new(clock);
    self
  }

  pub fn with_matching(mut self, matching: CategoryMatching) -> Self {
    self.matching = matching;
    self
  }

  pub fn with_limits(mut self, limits: Limits) -> Self {
    self.limits = limits;
    self
  }

  /// Abandon any operation still running after `deadline`.
  pub fn with_deadline(mut self, deadline: Duration) -> Self {
    self.deadline = Some(deadline);
    self
  }

  pub fn limits(&self) -> &Limits { &self.limits }

  pub(crate) fn connection(&self) -> &tokio_rusqlite::Connection { &self.conn }

  fn context(&self) -> QueryContext {
    QueryContext {
      matching:  self.matching,
      page_size: self.limits.links_page_size,
      now:       self.clock.now(),
    }
  }

  fn expiry(&self) -> Option<Expiry> {
    self.deadline.map(|limit| Expiry {
      limit,
      at: Instant::now() + limit,
    })
  }

  /// Run `op` under the store's deadline, if any. Expiry is reported, never
  /// retried.
  async fn bounded<T>(&self, op: impl Future<Output = Result<T>>) -> Result<T> {
    self.bounded_by(self.expiry(), op).await
  }

  /// Like [`Self::bounded`], for operations whose connection closures also
  /// check `expiry`. On expiry the running statement is interrupted.
  async fn bounded_by<T>(
    &self,
    expiry: Option<Expiry>,
    op: impl Future<Output = Result<T>>,
  ) -> Result<T> {
    let Some(expiry) = expiry else {
      return op.await;
    };
    match tokio::time::timeout_at(tokio::time::Instant::from_std(expiry.at), op).await {
      Ok(result) => result,
      Err(_) => {
        self.interrupt.interrupt();
        warn!(deadline = ?expiry.limit, "operation exceeded its deadline");
        Err(Error::Timeout(expiry.limit))
      }
    }
  }

  // ── Query execution ───────────────────────────────────────────────────

  async fn fetch_links(&self, query: LinkQuery) -> Result<Vec<RawLink>> {
    let owner_columns = query.has_owner_columns();
    let viewer_columns = query.has_viewer_columns();
    let RenderedQuery { sql, params } = query.render()?;
    debug!(%sql, params = params.len(), "fetching links");

    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            RawLink::from_row(row, owner_columns, viewer_columns)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn fetch_counts(&self, query: RenderedQuery) -> Result<Vec<CatCount>> {
    let RenderedQuery { sql, params } = query;
    debug!(%sql, params = params.len(), "fetching category counts");

    let counts = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok(CatCount {
              category: row.get(0)?,
              count:    row.get(1)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(counts)
  }

  async fn profile(&self, login_name: &str) -> Result<Option<Profile>> {
    let login_name = login_name.to_owned();

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT login_name, COALESCE(about, ''), COALESCE(pfp, ''), created
               FROM Users WHERE login_name = ?1",
              rusqlite::params![login_name],
              |row| {
                Ok(RawProfile {
                  login_name: row.get(0)?,
                  about:      row.get(1)?,
                  pfp:        row.get(2)?,
                  created:    row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }

  async fn link_tags(&self, link_id: i64) -> Result<Vec<Tag>> {
    let raws: Vec<RawTag> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, link_id, categories, submitted_by, last_updated
           FROM Tags WHERE link_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![link_id], RawTag::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTag::into_tag).collect()
  }

  async fn viewer_tag(&self, link_id: i64, viewer: Option<Uuid>) -> Result<Option<Tag>> {
    let Some(viewer) = viewer else {
      return Ok(None);
    };
    let viewer = encode_uuid(viewer);

    let raw: Option<RawTag> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT t.id, t.link_id, t.categories, t.submitted_by, t.last_updated
               FROM Tags t
               INNER JOIN Users u ON u.login_name = t.submitted_by
               WHERE t.link_id = ?1 AND u.id = ?2",
              rusqlite::params![link_id, viewer],
              RawTag::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTag::into_tag).transpose()
  }
}

/// Section query for a treasure map, with the request's shared stages.
fn tmap_section(listing: Listing, ctx: QueryContext, request: &TreasureMapRequest) -> LinkQuery {
  let mut query = LinkQuery::new(listing, ctx).apply(Stage::ViewerAugmentation(request.viewer));
  if let Some(cats) = &request.categories {
    query = query.apply(Stage::CategoryFilter(cats.clone()));
  }
  if !request.include_nsfw {
    query = query.apply(Stage::ExcludeCategory(NSFW.into()));
  }
  query
}

/// Commit `tx`, or roll it back if `expiry` has passed.
fn commit_unless_expired(
  tx: Transaction<'_>,
  expiry: Option<Expiry>,
) -> Result<(), tokio_rusqlite::Error> {
  match expiry {
    Some(expiry) if expiry.passed() => {
      tx.rollback()?;
      expiry.check()
    }
    _ => Ok(tx.commit()?),
  }
}

/// Map a decode failure inside a connection closure.
fn in_call<T>(result: Result<T>) -> Result<T, tokio_rusqlite::Error> {
  result.map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))
}

fn log_recompute(column: &'static str, link_id: i64, outcome: &Recomputed, lost_race: bool) {
  if lost_race {
    warn!(
      link_id,
      column, "consistency warning: value changed during recompute; last writer wins"
    );
  } else if let Recomputed::Updated { previous, current } = outcome {
    info!(link_id, column, %previous, %current, "rewrote derived link column");
  }
}

// ─── LinkStore impl ──────────────────────────────────────────────────────────

impl LinkStore for SqliteStore {
  type Error = Error;

  // ── Listings ──────────────────────────────────────────────────────────────

  #[tracing::instrument(skip(self))]
  async fn top_links(&self, request: TopLinksRequest) -> Result<Page<LinkView>> {
    self
      .bounded(async {
        let ctx = self.context();
        let page = request.page;

        let mut query = LinkQuery::new(Listing::TopLinks, ctx)
          .apply(Stage::ViewerAugmentation(request.viewer))
          .apply(Stage::Paginate(page));
        if let Some(cats) = request.categories {
          query = query.apply(Stage::CategoryFilter(cats));
        }
        if let Some(period) = request.period {
          query = query.apply(Stage::PeriodFilter(period));
        }
        if !request.include_nsfw {
          query = query.apply(Stage::ExcludeCategory(NSFW.into()));
        }

        let views = self
          .fetch_links(query)
          .await?
          .into_iter()
          .map(RawLink::into_view)
          .collect::<Result<Vec<_>>>()?;

        Ok(Page::from_fetched(views, page, ctx.page_size))
      })
      .await
  }

  #[tracing::instrument(skip(self))]
  async fn link_tag_page(&self, link_id: i64, viewer: Option<Uuid>) -> Result<TagPage> {
    self
      .bounded(async {
        let ctx = self.context();
        let query =
          LinkQuery::new(Listing::Link(link_id), ctx).apply(Stage::ViewerAugmentation(viewer));

        let link = self
          .fetch_links(query)
          .await?
          .into_iter()
          .next()
          .ok_or(fitm_core::Error::LinkNotFound(link_id))?
          .into_view()?;

        let (tags, viewer_tag) =
          tokio::try_join!(self.link_tags(link_id), self.viewer_tag(link_id, viewer))?;

        let rankings = TagRanking::rank(
          tags,
          link.link.submit_date,
          ctx.now,
          self.limits.tag_rankings_limit as usize,
        );

        Ok(TagPage {
          link,
          viewer_tag,
          rankings,
        })
      })
      .await
  }

  #[tracing::instrument(skip(self))]
  async fn treasure_map(&self, request: TreasureMapRequest) -> Result<TreasureMap> {
    self
      .bounded(async {
        let owner = request.owner.trim().to_owned();
        if owner.is_empty() {
          return Err(fitm_core::Error::MissingIdentity("owner login name").into());
        }

        let filter = request
          .categories
          .as_deref()
          .map(|cats| CategorySet::filter(cats))
          .transpose()?;

        let profile = self
          .profile(&owner)
          .await?
          .ok_or_else(|| fitm_core::Error::UserNotFound(owner.clone()))?;

        let ctx = self.context();
        let submitted = tmap_section(Listing::Submitted { owner: owner.clone() }, ctx, &request);
        let copied = tmap_section(Listing::Copied { owner: owner.clone() }, ctx, &request);
        let tagged = tmap_section(Listing::Tagged { owner }, ctx, &request);

        let (submitted, copied, tagged) = tokio::try_join!(
          self.fetch_links(submitted),
          self.fetch_links(copied),
          self.fetch_links(tagged),
        )?;

        let decode = |rows: Vec<RawLink>| {
          rows
            .into_iter()
            .map(RawLink::into_tmap_link)
            .collect::<Result<Vec<_>>>()
        };

        let sections = TreasureMapSections::assemble(
          decode(submitted)?,
          decode(copied)?,
          decode(tagged)?,
          filter.as_ref(),
          self.limits.treasure_map_facets,
        );

        Ok(TreasureMap {
          profile: filter.is_none().then_some(profile),
          sections,
        })
      })
      .await
  }

  // ── Derived columns ───────────────────────────────────────────────────────

  #[tracing::instrument(skip(self))]
  async fn recompute_global_categories(&self, link_id: i64) -> Result<Recomputed> {
    let now: DateTime<Utc> = self.clock.now();
    let expiry = self.expiry();

    let result = self
      .bounded_by(expiry, async {
        Ok(
          self
            .conn
            .call(move |conn| {
              if let Some(expiry) = expiry {
                expiry.check()?;
              }
              let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

              let link: Option<(String, String)> = tx
                .query_row(
                  "SELECT submit_date, COALESCE(global_cats, '') FROM Links WHERE id = ?1",
                  rusqlite::params![link_id],
                  |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
              let Some((submit_date, previous)) = link else {
                return Ok(None);
              };
              let link_submitted = in_call(decode_dt(&submit_date))?;

              let tags: Vec<(String, String)> = {
                let mut stmt =
                  tx.prepare("SELECT categories, last_updated FROM Tags WHERE link_id = ?1")?;
                stmt
                  .query_map(rusqlite::params![link_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                  .collect::<rusqlite::Result<Vec<_>>>()?
              };

              let mut consensus = Consensus::new();
              for (categories, last_updated) in &tags {
                let timing = TagTiming {
                  link_submitted,
                  last_updated: in_call(decode_dt(last_updated))?,
                };
                consensus.add(categories, timing.score(now));
              }

              let outcome = Recomputed::from_values(previous, consensus.global_categories());
              let mut lost_race = false;
              if let Recomputed::Updated { previous, current } = &outcome {
                let changed = tx.execute(
                  "UPDATE Links SET global_cats = ?1
                   WHERE id = ?2 AND COALESCE(global_cats, '') = ?3",
                  rusqlite::params![current, link_id, previous],
                )?;
                lost_race = changed == 0;
              }
              commit_unless_expired(tx, expiry)?;

              Ok(Some((outcome, lost_race)))
            })
            .await?,
        )
      })
      .await?;

    let (outcome, lost_race) = result.ok_or(fitm_core::Error::LinkNotFound(link_id))?;
    log_recompute("global_cats", link_id, &outcome, lost_race);
    Ok(outcome)
  }

  #[tracing::instrument(skip(self))]
  async fn recompute_global_summary(&self, link_id: i64) -> Result<Recomputed> {
    let expiry = self.expiry();

    let result = self
      .bounded_by(expiry, async {
        Ok(
          self
            .conn
            .call(move |conn| {
              if let Some(expiry) = expiry {
                expiry.check()?;
              }
              let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

              let previous: Option<String> = tx
                .query_row(
                  "SELECT COALESCE(global_summary, '') FROM Links WHERE id = ?1",
                  rusqlite::params![link_id],
                  |row| row.get(0),
                )
                .optional()?;
              let Some(previous) = previous else {
                return Ok(None);
              };

              let candidates: Vec<SummaryCandidate> = {
                let mut stmt = tx.prepare(
                  "SELECT s.text, COUNT(sl.id)
                   FROM Summaries s
                   LEFT JOIN \"Summary Likes\" sl ON sl.summary_id = s.id
                   WHERE s.link_id = ?1
                   GROUP BY s.id",
                )?;
                stmt
                  .query_map(rusqlite::params![link_id], |row| {
                    Ok(SummaryCandidate {
                      text:  row.get(0)?,
                      likes: row.get(1)?,
                    })
                  })?
                  .collect::<rusqlite::Result<Vec<_>>>()?
              };

              let outcome = Recomputed::from_values(previous, pick_global_summary(&candidates));
              let mut lost_race = false;
              if let Recomputed::Updated { previous, current } = &outcome {
                let changed = tx.execute(
                  "UPDATE Links SET global_summary = ?1
                   WHERE id = ?2 AND COALESCE(global_summary, '') = ?3",
                  rusqlite::params![current, link_id, previous],
                )?;
                lost_race = changed == 0;
              }
              commit_unless_expired(tx, expiry)?;

              Ok(Some((outcome, lost_race)))
            })
            .await?,
        )
      })
      .await?;

    let (outcome, lost_race) = result.ok_or(fitm_core::Error::LinkNotFound(link_id))?;
    log_recompute("global_summary", link_id, &outcome, lost_race);
    Ok(outcome)
  }

  // ── Aggregates ────────────────────────────────────────────────────────────

  #[tracing::instrument(skip(self))]
  async fn top_categories(&self, request: CategoryCountsRequest) -> Result<Vec<CatCount>> {
    self
      .bounded(async {
        let filter = request
          .categories
          .as_deref()
          .map(|cats| CategorySet::filter(cats))
          .transpose()?;
        let period = request.period.as_deref().map(Period::parse).transpose()?;
        let limit = if request.more {
          self.limits.more_category_counts_limit
        } else {
          self.limits.category_counts_limit
        };

        let query = query::category_counts(&self.context(), filter.as_ref(), period, limit);
        self.fetch_counts(query).await
      })
      .await
  }

  #[tracing::instrument(skip(self))]
  async fn top_contributors(&self, request: ContributorsRequest) -> Result<Vec<Contributor>> {
    self
      .bounded(async {
        let filter = request
          .categories
          .as_deref()
          .map(|cats| CategorySet::filter(cats))
          .transpose()?;
        let period = request.period.as_deref().map(Period::parse).transpose()?;

        let RenderedQuery { sql, params } = query::contributors(
          &self.context(),
          filter.as_ref(),
          period,
          self.limits.contributors_limit,
        );
        debug!(%sql, params = params.len(), "fetching contributors");

        let contributors = self
          .conn
          .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
              .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                Ok(Contributor {
                  login_name:      row.get(0)?,
                  links_submitted: row.get(1)?,
                })
              })?
              .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
          })
          .await?;
        Ok(contributors)
      })
      .await
  }

  #[tracing::instrument(skip(self))]
  async fn suggest_categories(
    &self,
    prefix: String,
    selected: Vec<String>,
  ) -> Result<Vec<CatCount>> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
      return Ok(Vec::new());
    }
    let omit: Vec<String> = selected.iter().map(|c| c.trim().to_lowercase()).collect();

    self
      .bounded(async {
        let query = query::suggestions(
          &self.context(),
          prefix,
          &omit,
          self.limits.suggestions_limit,
        );
        self.fetch_counts(query).await
      })
      .await
  }
}
