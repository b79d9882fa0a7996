//! Recency windows for listings.
//!
//! There is deliberately no `All` variant: an unbounded listing is expressed
//! by not applying a period at all.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{Error, Result};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Period {
  Day,
  Week,
  Month,
  Year,
}

impl Period {
  /// Parse a caller-supplied token, echoing it back on failure.
  pub fn parse(token: &str) -> Result<Self> {
    token
      .parse()
      .map_err(|_| Error::InvalidPeriod(token.to_owned()))
  }

  /// Length of the lookback window in whole days.
  pub fn days(self) -> i64 {
    match self {
      Self::Day => 1,
      Self::Week => 7,
      Self::Month => 30,
      Self::Year => 365,
    }
  }

  /// Earliest instant still inside the window anchored at `now`.
  pub fn cutoff(self, now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(self.days())
  }

  pub fn contains(self, now: DateTime<Utc>, at: DateTime<Utc>) -> bool {
    at > self.cutoff(now)
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn parses_known_tokens() {
    assert_eq!(Period::parse("day").unwrap(), Period::Day);
    assert_eq!(Period::parse("week").unwrap(), Period::Week);
    assert_eq!(Period::parse("month").unwrap(), Period::Month);
    assert_eq!(Period::parse("year").unwrap(), Period::Year);
  }

  #[test]
  fn all_is_not_a_period() {
    let err = Period::parse("all").unwrap_err();
    assert_eq!(err, Error::InvalidPeriod("all".into()));
  }

  #[test]
  fn unknown_token_is_echoed() {
    let err = Period::parse("fortnight").unwrap_err();
    assert!(err.to_string().contains("fortnight"));
  }

  #[test]
  fn window_excludes_the_boundary() {
    let now = Utc.with_ymd_and_hms(2024, 6, 8, 12, 0, 0).unwrap();
    assert!(Period::Week.contains(now, now - Duration::days(6)));
    assert!(!Period::Week.contains(now, now - Duration::days(7)));
  }

  #[test]
  fn display_round_trips() {
    assert_eq!(Period::Month.to_string(), "month");
  }
}
