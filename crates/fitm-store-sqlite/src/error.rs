//! Error type for `fitm-store-sqlite`.

use std::time::Duration;

use fitm_core::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] fitm_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// The operation did not finish before the store's deadline. It is not
  /// retried.
  #[error("operation timed out after {0:?}")]
  Timeout(Duration),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Core(e) => e.kind(),
      Self::Database(_) | Self::DateParse(_) | Self::Timeout(_) => ErrorKind::Storage,
    }
  }

  /// Message safe to show to an end user. Storage failures never expose
  /// query text or driver messages.
  pub fn public_message(&self) -> String {
    match self {
      Self::Core(e) => e.public_message(),
      Self::Timeout(_) => "the request took too long; try again".to_owned(),
      _ => "internal storage error; try again".to_owned(),
    }
  }
}

/// Errors raised inside a connection closure travel back boxed in
/// `tokio_rusqlite::Error::Other`; they are unwrapped here.
impl From<tokio_rusqlite::Error> for Error {
  fn from(err: tokio_rusqlite::Error) -> Self {
    match err {
      tokio_rusqlite::Error::Other(inner) => match inner.downcast::<Error>() {
        Ok(own) => *own,
        Err(inner) => Self::Database(tokio_rusqlite::Error::Other(inner)),
      },
      err => Self::Database(err),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn storage_errors_hide_details() {
    let err = Error::Database(tokio_rusqlite::Error::Rusqlite(
      rusqlite::Error::InvalidQuery,
    ));
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(!err.public_message().contains("query"));
  }

  #[test]
  fn errors_from_connection_closures_are_unwrapped() {
    let boxed = tokio_rusqlite::Error::Other(Box::new(Error::Timeout(Duration::from_millis(5))));
    assert!(matches!(Error::from(boxed), Error::Timeout(_)));
  }

  #[test]
  fn core_errors_keep_their_kind() {
    let err = Error::from(fitm_core::Error::UserNotFound("ghost".into()));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.public_message().contains("ghost"));
  }
}
