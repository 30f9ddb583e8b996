//! # rosterlink
//!
//! Entity-alias resolution for linking tabular exports that identify the
//! same people differently: an LMS gradebook keyed by login, a quiz export
//! keyed by display name, a spreadsheet keyed by email.
//!
//! ## Core Concepts
//!
//! - **Alias**: a string identifying an entity, unique across the store
//! - **Entity**: a numeric identity (`EntityId`, starting at 400) owning a
//!   set of aliases
//! - **Binding**: resolving each table row to an entity through ordered
//!   candidate columns
//! - **Reconciliation**: pairing entities no alias could connect, through a
//!   pluggable [`Matcher`]
//!
//! ## Usage
//!
//! ```
//! use rosterlink::{AliasStore, BindingOptions, ColumnRef, Table, derive_entity_column};
//!
//! let mut store = AliasStore::new();
//! let roster = Table::from_rows(
//!     ["email", "name"],
//!     vec![vec!["ann@uni.edu", "Ann One"], vec!["bob@uni.edu", "Bob Two"]],
//! )?;
//! let ids = derive_entity_column(
//!     &mut store,
//!     &roster,
//!     &[ColumnRef::named("email"), ColumnRef::named("name")],
//!     BindingOptions::introducing(),
//! )?;
//!
//! assert_eq!(store.id_of("Bob Two")?, ids[1]);
//! # Ok::<(), rosterlink::LinkError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod entity;
pub mod error;
pub mod reconcile;
pub mod table;

#[cfg(feature = "csv")]
pub mod csv_io;
#[cfg(feature = "csv")]
pub mod job;

pub use config::{LinkConfig, TableSource};
pub use entity::{
    looks_like_person_name, AliasStore, Anchor, EntityId, MutualAlias, ENTITY_ID_BASE,
};
pub use error::{
    AliasError, ConfigError, LinkError, LinkResult, MatcherError, ReconcileError, TableError,
};
pub use reconcile::{
    find_unmatched, matcher_fn, reconcile, reconcile_async, ExactLabelMatcher, MatchedPair,
    Matcher, NoopMatcher, PromptMatcher, ReconcileReport, UnmatchedSet,
};
pub use table::{
    candidate_values, derive_entity_column, reindex_by_entity, BindingOptions, ColumnRef,
    EntityColumnBuilder, Table,
};
