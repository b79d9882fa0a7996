//! Core types and trait definitions for the fitm link index.
//!
//! This crate is deliberately free of HTTP and database dependencies. It holds
//! the records read back from storage, the pure reductions run over them
//! (category consensus, facet counting, pagination) and the [`LinkStore`]
//! abstraction that storage backends implement.

pub mod category;
pub mod clock;
pub mod consensus;
pub mod error;
pub mod limits;
pub mod link;
pub mod page;
pub mod period;
pub mod store;
pub mod tag;
pub mod tmap;

pub use error::{Error, ErrorKind, Result};
pub use store::LinkStore;
