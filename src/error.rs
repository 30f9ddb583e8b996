//! Error types for rosterlink.
//!
//! All errors are strongly typed using thiserror so callers can match on the
//! exact failure. The alias store, table binding and reconciliation layers
//! never log or retry: every failure is returned at the point of detection,
//! optionally wrapped with row or label context.

use std::path::PathBuf;

use thiserror::Error;

use crate::entity::EntityId;

/// Failures of the alias store itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AliasError {
    /// None of the given aliases is registered.
    #[error("{}", describe_unknown(.aliases))]
    UnknownAlias {
        /// Every alias that was looked up, in lookup order.
        aliases: Vec<String>,
    },

    /// The ID was never assigned by this store.
    #[error("Entity not found: {id}")]
    UnknownEntity {
        /// The unknown ID.
        id: EntityId,
    },

    /// A new entity was requested with an alias that is already registered.
    #[error("Alias '{alias}' already exists (entity {existing})")]
    AliasAlreadyExists {
        /// The alias.
        alias: String,
        /// Entity the alias already belongs to, or the entity being created
        /// when the alias was given twice.
        existing: EntityId,
    },

    /// An alias was added to one entity while it belongs to another.
    #[error("Alias '{alias}' belongs to entity {existing}, cannot add it to entity {requested}")]
    AliasConflict {
        /// The alias.
        alias: String,
        /// Entity the alias already belongs to.
        existing: EntityId,
        /// Entity the alias was being added to.
        requested: EntityId,
    },

    /// Aliases believed to denote one entity resolve to several entities.
    #[error("Provided aliases match conflicting entities: {}", describe_conflicts(.matches))]
    ConflictingEntities {
        /// Each distinct entity hit, with the first alias that hit it.
        matches: Vec<(EntityId, String)>,
    },

    /// A merge that may not create entities matched nothing.
    #[error("No existing entity matches any of: {aliases:?}")]
    NoMatchingEntity {
        /// The aliases that were offered.
        aliases: Vec<String>,
    },

    /// An entity cannot be created or merged from zero aliases.
    #[error("At least one alias is required")]
    EmptyAliases,
}

impl AliasError {
    /// Builds an `UnknownAlias` error for a single alias.
    #[must_use]
    pub fn unknown(alias: impl Into<String>) -> Self {
        Self::UnknownAlias {
            aliases: vec![alias.into()],
        }
    }

    /// Returns true for failures callers can recover from by treating the
    /// aliases as new.
    #[must_use]
    pub const fn is_unknown_alias(&self) -> bool {
        matches!(self, Self::UnknownAlias { .. } | Self::NoMatchingEntity { .. })
    }

    /// Returns true for failures that indicate inconsistent upstream data.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AliasAlreadyExists { .. }
                | Self::AliasConflict { .. }
                | Self::ConflictingEntities { .. }
        )
    }
}

fn describe_unknown(aliases: &[String]) -> String {
    match aliases {
        [single] => format!("Alias not found: {single}"),
        many => format!("None of the following aliases were found: {many:?}"),
    }
}

fn describe_conflicts(matches: &[(EntityId, String)]) -> String {
    matches
        .iter()
        .map(|(id, alias)| format!("{id} ('{alias}')"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failures while binding table rows to entities.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("Column '{column}' not found")]
    MissingColumn {
        /// Requested column name.
        column: String,
    },

    #[error("Column '{column}' appears more than once")]
    DuplicateColumn {
        /// Repeated column name.
        column: String,
    },

    #[error("Candidate column {candidate} specified more than once")]
    DuplicateCandidate {
        /// Display form of the repeated candidate.
        candidate: String,
    },

    #[error("At least one candidate column is required")]
    NoCandidates,

    #[error("External column has {actual} values, table has {expected} rows")]
    MisalignedColumn {
        /// Number of rows in the table.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },

    #[error("Row {row} has {actual} cells, expected {expected}")]
    RaggedRow {
        /// Zero-based row index.
        row: usize,
        /// Number of columns in the table.
        expected: usize,
        /// Number of cells supplied.
        actual: usize,
    },

    #[error("Rows {first_row} and {second_row} both resolve to entity {id}")]
    DuplicateEntityKey {
        /// The shared entity.
        id: EntityId,
        /// First row resolving to `id`.
        first_row: usize,
        /// Later row resolving to `id`.
        second_row: usize,
    },

    #[error("Row {row}: {source}")]
    Alias {
        /// Zero-based row index.
        row: usize,
        /// Underlying store failure.
        #[source]
        source: AliasError,
    },
}

impl TableError {
    /// Returns the store failure behind this error, if any.
    #[must_use]
    pub const fn alias_error(&self) -> Option<&AliasError> {
        match self {
            Self::Alias { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Failures raised by a matcher while producing a mapping.
#[derive(Debug, Error)]
pub enum MatcherError {
    /// Prompt input/output failed.
    #[error("Matcher I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The matcher gave up without producing a mapping.
    #[error("Matcher aborted: {reason}")]
    Aborted {
        /// Why the matcher stopped.
        reason: String,
    },
}

/// Failures of the reconciliation protocol.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Computing the unmatched sets failed.
    #[error("Cannot compute unmatched entities: {0}")]
    Alias(#[from] AliasError),

    /// The matcher itself failed.
    #[error(transparent)]
    Matcher(#[from] MatcherError),

    /// The matcher returned a mapping that breaks its contract.
    #[error("Matcher returned an invalid mapping: {reason}")]
    InvalidMatch {
        /// What was wrong with the mapping.
        reason: String,
    },

    /// Merging one returned pair failed.
    #[error("Cannot merge '{input}' with '{destination}': {source}")]
    Pair {
        /// Input-side label.
        input: String,
        /// Destination-side label.
        destination: String,
        /// Underlying store failure.
        #[source]
        source: AliasError,
    },
}

/// Configuration errors.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config for {section}: {reason}")]
    Invalid {
        /// Config section at fault.
        section: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Top-level error type for rosterlink.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Alias error: {0}")]
    Alias(#[from] AliasError),

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "csv")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LinkError {
    /// Creates an I/O error for a path.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if this is a store error.
    #[must_use]
    pub const fn is_alias(&self) -> bool {
        matches!(self, Self::Alias(_))
    }

    /// Returns true if this is a table binding error.
    #[must_use]
    pub const fn is_table(&self) -> bool {
        matches!(self, Self::Table(_))
    }

    /// Returns true if this is a reconciliation error.
    #[must_use]
    pub const fn is_reconcile(&self) -> bool {
        matches!(self, Self::Reconcile(_))
    }

    /// Returns true if this error can only come from a programming mistake
    /// in the caller rather than from the data.
    #[must_use]
    pub const fn is_caller_bug(&self) -> bool {
        match self {
            Self::Alias(AliasError::UnknownEntity { .. }) => true,
            Self::Table(e) => matches!(
                e,
                TableError::DuplicateCandidate { .. }
                    | TableError::NoCandidates
                    | TableError::MisalignedColumn { .. }
            ),
            Self::Reconcile(ReconcileError::InvalidMatch { .. }) => true,
            _ => false,
        }
    }
}

/// Result type alias for rosterlink operations.
pub type LinkResult<T> = Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_alias_single() {
        let err = AliasError::unknown("test_alias");
        let msg = format!("{err}");
        assert!(msg.contains("not found"));
        assert!(msg.contains("test_alias"));
        assert!(err.is_unknown_alias());
    }

    #[test]
    fn test_unknown_alias_multiple() {
        let err = AliasError::UnknownAlias {
            aliases: vec!["alias1".to_string(), "alias2".to_string()],
        };
        let msg = format!("{err}");
        assert!(msg.contains("None of the following aliases were found"));
        assert!(msg.contains("alias2"));
    }

    #[test]
    fn test_unknown_entity() {
        let err = AliasError::UnknownEntity {
            id: EntityId::from_index(0),
        };
        assert_eq!(format!("{err}"), "Entity not found: 400");
    }

    #[test]
    fn test_conflicting_entities_lists_each_hit() {
        let err = AliasError::ConflictingEntities {
            matches: vec![
                (EntityId::from_index(0), "a1".to_string()),
                (EntityId::from_index(1), "a2".to_string()),
            ],
        };
        let msg = format!("{err}");
        assert!(msg.contains("conflicting entities"));
        assert!(msg.contains("400 ('a1')"));
        assert!(msg.contains("401 ('a2')"));
        assert!(err.is_conflict());
        assert!(!err.is_unknown_alias());
    }

    #[test]
    fn test_table_error_carries_row() {
        let err = TableError::Alias {
            row: 3,
            source: AliasError::unknown("x"),
        };
        assert!(format!("{err}").starts_with("Row 3:"));
        assert_eq!(err.alias_error(), Some(&AliasError::unknown("x")));
    }

    #[test]
    fn test_reconcile_pair_error() {
        let err = ReconcileError::Pair {
            input: "student@mail.com".to_string(),
            destination: "Name One".to_string(),
            source: AliasError::NoMatchingEntity {
                aliases: vec!["a".to_string()],
            },
        };
        let msg = format!("{err}");
        assert!(msg.contains("student@mail.com"));
        assert!(msg.contains("Name One"));
    }

    #[test]
    fn test_link_error_from_alias() {
        let err: LinkError = AliasError::EmptyAliases.into();
        assert!(err.is_alias());
        assert!(!err.is_caller_bug());
    }

    #[test]
    fn test_link_error_caller_bug() {
        let err: LinkError = AliasError::UnknownEntity {
            id: EntityId::from_index(9),
        }
        .into();
        assert!(err.is_caller_bug());

        let err: LinkError = TableError::NoCandidates.into();
        assert!(err.is_table());
        assert!(err.is_caller_bug());

        let err: LinkError = ReconcileError::InvalidMatch {
            reason: "bad".to_string(),
        }
        .into();
        assert!(err.is_reconcile());
        assert!(err.is_caller_bug());
    }

    #[test]
    fn test_link_error_io_names_path() {
        let err = LinkError::io(
            "grades.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        let msg = format!("{err}");
        assert!(msg.contains("grades.csv"));
        assert!(msg.contains("missing"));
    }
}
