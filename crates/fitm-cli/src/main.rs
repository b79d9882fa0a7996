//! `fitm` — query and maintain a fitm link index from the command line.
//!
//! Reads `fitm.toml` (or the path given with `--config`), layers `FITM_*`
//! environment variables on top, opens the SQLite store and prints the
//! result of one operation as JSON.
//!
//! # Usage
//!
//! ```
//! fitm top-links --cats retro,gaming --period week --page 1
//! fitm tmap alice --cats music
//! fitm recompute-cats 12 13
//! fitm check-tag "Retro,gaming"
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use fitm_core::{
  ErrorKind,
  category::CategorySet,
  page::normalize_page,
  store::{
    CategoryCountsRequest, ContributorsRequest, LinkStore, TopLinksRequest, TreasureMapRequest,
  },
};
use fitm_store_sqlite::{SqliteStore, StoreSettings};
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about = "Query and maintain a fitm link index")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "fitm.toml")]
  config: PathBuf,

  /// Override the configured store path.
  #[arg(long)]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Links ranked by likes.
  TopLinks {
    /// Comma-separated categories every link must carry.
    #[arg(long, value_delimiter = ',')]
    cats:   Option<Vec<String>>,
    /// One of day, week, month, year. Omit for all time.
    #[arg(long)]
    period: Option<String>,
    /// User id of the viewer, for personalisation flags.
    #[arg(long)]
    viewer: Option<Uuid>,
    /// 0 for the first page unpaginated; negative pages become 1.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    page:   i64,
    /// Include links categorised nsfw.
    #[arg(long)]
    nsfw:   bool,
  },

  /// A link with its ranked tags.
  TagPage {
    link_id: i64,
    #[arg(long)]
    viewer:  Option<Uuid>,
  },

  /// A user's submitted, copied and tagged links.
  Tmap {
    /// Login name of the map's owner.
    owner:  String,
    #[arg(long, value_delimiter = ',')]
    cats:   Option<Vec<String>>,
    #[arg(long)]
    viewer: Option<Uuid>,
    #[arg(long)]
    nsfw:   bool,
  },

  /// Recompute the consensus categories of links.
  RecomputeCats {
    #[arg(required = true)]
    link_ids: Vec<i64>,
  },

  /// Recompute the global summary of links.
  RecomputeSummary {
    #[arg(required = true)]
    link_ids: Vec<i64>,
  },

  /// Most used consensus categories.
  Categories {
    #[arg(long, value_delimiter = ',')]
    cats:   Option<Vec<String>>,
    #[arg(long)]
    period: Option<String>,
    /// Return the longer list.
    #[arg(long)]
    more:   bool,
  },

  /// Users ranked by links submitted.
  Contributors {
    #[arg(long, value_delimiter = ',')]
    cats:   Option<Vec<String>>,
    #[arg(long)]
    period: Option<String>,
  },

  /// Validate a tag's category list against the configured limits and print
  /// it normalised.
  CheckTag {
    /// Comma-separated categories, as a user would submit them.
    categories: String,
  },

  /// Categories starting with a prefix.
  Suggest {
    prefix:   String,
    /// Categories already chosen, left out of the suggestions.
    #[arg(long, value_delimiter = ',')]
    selected: Vec<String>,
  },
}

#[derive(Serialize)]
struct RecomputeReport<T> {
  link_id: i64,
  #[serde(flatten)]
  result:  T,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .set_default("store_path", "fitm.db")?
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("FITM").try_parsing(true))
    .build()
    .context("failed to read config file")?;

  let mut store_cfg: StoreSettings = settings
    .try_deserialize()
    .context("failed to deserialise StoreSettings")?;
  if let Some(path) = cli.store {
    store_cfg.store_path = path;
  }

  let store = SqliteStore::open_with(&store_cfg)
    .await
    .with_context(|| format!("failed to open store at {:?}", store_cfg.store_path))?;

  run(&store, cli.command).await
}

async fn run(store: &SqliteStore, command: Command) -> anyhow::Result<()> {
  match command {
    Command::TopLinks {
      cats,
      period,
      viewer,
      page,
      nsfw,
    } => {
      let request = TopLinksRequest {
        categories: cats,
        period,
        viewer,
        page: normalize_page(page),
        include_nsfw: nsfw,
      };
      emit(&store.top_links(request).await.map_err(surface)?)
    }

    Command::TagPage { link_id, viewer } => {
      emit(&store.link_tag_page(link_id, viewer).await.map_err(surface)?)
    }

    Command::Tmap {
      owner,
      cats,
      viewer,
      nsfw,
    } => {
      let request = TreasureMapRequest {
        owner,
        viewer,
        categories: cats,
        include_nsfw: nsfw,
      };
      emit(&store.treasure_map(request).await.map_err(surface)?)
    }

    Command::RecomputeCats { link_ids } => {
      let mut reports = Vec::with_capacity(link_ids.len());
      for link_id in link_ids {
        let result = store
          .recompute_global_categories(link_id)
          .await
          .map_err(surface)?;
        reports.push(RecomputeReport { link_id, result });
      }
      emit(&reports)
    }

    Command::RecomputeSummary { link_ids } => {
      let mut reports = Vec::with_capacity(link_ids.len());
      for link_id in link_ids {
        let result = store
          .recompute_global_summary(link_id)
          .await
          .map_err(surface)?;
        reports.push(RecomputeReport { link_id, result });
      }
      emit(&reports)
    }

    Command::Categories { cats, period, more } => {
      let request = CategoryCountsRequest {
        period,
        categories: cats,
        more,
      };
      emit(&store.top_categories(request).await.map_err(surface)?)
    }

    Command::Contributors { cats, period } => {
      let request = ContributorsRequest {
        categories: cats,
        period,
      };
      emit(&store.top_contributors(request).await.map_err(surface)?)
    }

    Command::CheckTag { categories } => {
      let set = CategorySet::parse(&categories, store.limits()).map_err(|e| surface(e.into()))?;
      emit(&set.as_slice())
    }

    Command::Suggest { prefix, selected } => {
      emit(&store.suggest_categories(prefix, selected).await.map_err(surface)?)
    }
  }
}

fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// Caller-fixable failures are reported by their public message; storage
/// failures keep their full chain for the log.
fn surface(e: fitm_store_sqlite::Error) -> anyhow::Error {
  match e.kind() {
    ErrorKind::Validation => anyhow::anyhow!("invalid request: {}", e.public_message()),
    ErrorKind::NotFound => anyhow::anyhow!("not found: {}", e.public_message()),
    ErrorKind::Storage => {
      tracing::error!(error = %e, "storage failure");
      anyhow::Error::new(e).context("storage failure")
    }
  }
}
