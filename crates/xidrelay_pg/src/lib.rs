//! # xidrelay PostgreSQL
//!
//! A small blocking facade over `tokio-postgres`.
//!
//! The log switcher and the table resolver run on plain threads and issue a
//! handful of statements per tick, so [`PgSession`] owns a private
//! current-thread runtime and blocks on each call.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod ident;
mod session;

pub use error::{PgError, PgResult};
pub use ident::{split_qualified, validate_identifier};
pub use session::PgSession;

pub use tokio_postgres::types::ToSql;
pub use tokio_postgres::Row;
