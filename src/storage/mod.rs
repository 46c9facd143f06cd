//! Record store access.
//!
//! The store holds two tables, `Teams` and `Players`, inside a SQLite database.
//! Everything that reaches SQL goes through this module: column identifiers come
//! from the fixed [`Field`] set of each [`Table`], and values are always bound
//! as statement parameters.
//!
//! # Key Components
//!
//! - [`Store`]: `get`/`add`/`update`/`delete` against one database file.
//! - [`Predicate`]: filter built from [`Constraint`]s, consumed by [`Store::get`].
//! - [`Record`]: a decoded [`Team`] or [`Player`] row.
//! - [`FieldMap`]: ordered `name -> value` list sent over the wire.
//!
//! Mutating calls never fail past this module: they report `true` or `false`
//! and log the underlying error.
//!
//! # See Also
//!
//! - [`protocol`](crate::protocol): validates requests before they reach the store.
mod field;
mod predicate;
mod record;
mod store;

pub use error::StorageError;
pub use field::{Field, FieldKind, FieldMap, Table, UnknownTable, Value};
pub use predicate::{Comparison, Constraint, Predicate, PredicateError};
pub use record::{Conference, Division, DivisionError, Player, Record, Team};
pub use store::Store;

pub mod error {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum StorageError {
        #[error("[open][{path}]: {source}")]
        Open {
            path: String,
            source: rusqlite::Error,
        },

        #[error("[query]: {0}")]
        Query(#[from] rusqlite::Error),
    }
}
