//! Store configuration, deserialised by the binary from file and
//! environment.

use std::{path::PathBuf, time::Duration};

use fitm_core::limits::Limits;
use serde::Deserialize;

use crate::query::CategoryMatching;

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
  pub store_path:        PathBuf,
  #[serde(default)]
  pub category_matching: CategoryMatching,
  /// Deadline for each composite operation. No deadline when unset.
  #[serde(default)]
  pub query_timeout_ms:  Option<u64>,
  #[serde(flatten)]
  pub limits:            Limits,
}

impl StoreSettings {
  pub fn deadline(&self) -> Option<Duration> {
    self.query_timeout_ms.map(Duration::from_millis)
  }
}
