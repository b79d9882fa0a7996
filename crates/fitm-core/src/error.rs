//! Error types for `fitm-core`.

use thiserror::Error;

/// Coarse classification of a failure, used by callers to pick a
/// 4xx-equivalent or 5xx-equivalent outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// The request was malformed; the caller can fix it.
  Validation,
  /// The request was well-formed but names something that does not exist.
  NotFound,
  /// Execution failed; opaque beyond "try again".
  Storage,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
  #[error("invalid category filter {input:?}: {reason}")]
  InvalidFilter { input: String, reason: &'static str },

  #[error("invalid period {0:?}: expected one of day, week, month, year")]
  InvalidPeriod(String),

  #[error("invalid categories {input:?}: {reason}")]
  InvalidCategories { input: String, reason: String },

  #[error("missing required identity: {0}")]
  MissingIdentity(&'static str),

  #[error("link not found: {0}")]
  LinkNotFound(i64),

  #[error("user not found: {0}")]
  UserNotFound(String),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::InvalidFilter { .. }
      | Self::InvalidPeriod(_)
      | Self::InvalidCategories { .. }
      | Self::MissingIdentity(_) => ErrorKind::Validation,
      Self::LinkNotFound(_) | Self::UserNotFound(_) => ErrorKind::NotFound,
    }
  }

  /// Message safe to show to an end user. Every core error echoes only the
  /// caller's own input, so this is the display form.
  pub fn public_message(&self) -> String { self.to_string() }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
