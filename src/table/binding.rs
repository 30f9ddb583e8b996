//! Binding table rows to entities.
//!
//! Each row of a table is resolved to an entity by scanning a list of
//! candidate columns strictly left to right: the first cell value already
//! known to the store decides the row's entity, no matter what later
//! columns hold. Unknown rows either create entities (`expect_new`) or fail.
//!
//! With `collect_new`, every candidate value of a row is added as an alias of
//! the resolved entity. This is the one place where binding mutates the
//! store; the whole call runs against a staged copy and is committed only
//! when every row succeeds, so the store is exclusively borrowed for the
//! duration and left untouched on error.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::{AliasStore, EntityId};
use crate::error::{AliasError, TableError};
use crate::table::Table;

/// Key column name of tables re-keyed by entity.
pub const ENTITY_KEY: &str = "id";

/// Token naming the row key in textual candidate lists.
pub const ROW_KEY_TOKEN: &str = "@key";

/// One place a row's alias may be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    /// A column of the table, by name.
    Named(String),
    /// The table's row key.
    RowKey,
    /// Values supplied by the caller, aligned with the table's rows.
    External(Vec<String>),
}

impl ColumnRef {
    /// A named column.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// A caller-supplied column aligned with the table's rows.
    #[must_use]
    pub fn external<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::External(values.into_iter().map(Into::into).collect())
    }

    /// Parses a textual candidate: [`ROW_KEY_TOKEN`] or a column name.
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        if spec == ROW_KEY_TOKEN {
            Self::RowKey
        } else {
            Self::named(spec)
        }
    }
}

impl From<&str> for ColumnRef {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for ColumnRef {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "'{name}'"),
            Self::RowKey => write!(f, "<row key>"),
            Self::External(values) => write!(f, "<external column of {}>", values.len()),
        }
    }
}

/// How rows that are not yet known are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingOptions {
    /// Create an entity for rows with no known candidate value.
    pub expect_new: bool,
    /// Register every candidate value of a row as an alias of its entity.
    pub collect_new: bool,
}

impl Default for BindingOptions {
    fn default() -> Self {
        Self {
            expect_new: false,
            collect_new: true,
        }
    }
}

impl BindingOptions {
    /// Options for a table that introduces entities.
    #[must_use]
    pub const fn introducing() -> Self {
        Self {
            expect_new: true,
            collect_new: true,
        }
    }
}

enum Source<'a> {
    Column(usize),
    Key,
    External(&'a [String]),
}

fn resolve_sources<'a, K>(
    table: &Table<K>,
    candidates: &'a [ColumnRef],
) -> Result<Vec<Source<'a>>, TableError> {
    if candidates.is_empty() {
        return Err(TableError::NoCandidates);
    }

    let mut seen_names = HashSet::new();
    let mut seen_key = false;
    let mut sources = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let duplicate = match candidate {
            ColumnRef::Named(name) => !seen_names.insert(name.as_str()),
            ColumnRef::RowKey => std::mem::replace(&mut seen_key, true),
            ColumnRef::External(_) => false,
        };
        if duplicate {
            return Err(TableError::DuplicateCandidate {
                candidate: candidate.to_string(),
            });
        }

        sources.push(match candidate {
            ColumnRef::Named(name) => Source::Column(table.column_index(name).ok_or_else(|| {
                TableError::MissingColumn {
                    column: name.clone(),
                }
            })?),
            ColumnRef::RowKey => Source::Key,
            ColumnRef::External(values) => {
                if values.len() != table.len() {
                    return Err(TableError::MisalignedColumn {
                        expected: table.len(),
                        actual: values.len(),
                    });
                }
                Source::External(values)
            }
        });
    }
    Ok(sources)
}

/// Non-blank candidate values of every row, in candidate order.
///
/// This is the alias group each row contributes, as used for destination
/// groups during reconciliation.
///
/// # Errors
/// `NoCandidates`, `DuplicateCandidate`, `MissingColumn` or
/// `MisalignedColumn` for bad arguments.
pub fn candidate_values<K: fmt::Display>(
    table: &Table<K>,
    candidates: &[ColumnRef],
) -> Result<Vec<Vec<String>>, TableError> {
    let sources = resolve_sources(table, candidates)?;
    Ok(table
        .rows()
        .enumerate()
        .map(|(row, (key, cells))| {
            sources
                .iter()
                .map(|source| match source {
                    Source::Column(index) => cells[*index].clone(),
                    Source::Key => key.to_string(),
                    Source::External(values) => values[row].clone(),
                })
                .filter(|value| !value.trim().is_empty())
                .collect()
        })
        .collect())
}

/// Resolves every row on a staged copy of `store`.
fn bind_rows<K: fmt::Display>(
    store: &AliasStore,
    table: &Table<K>,
    candidates: &[ColumnRef],
    options: BindingOptions,
) -> Result<(AliasStore, Vec<EntityId>), TableError> {
    let rows = candidate_values(table, candidates)?;
    let mut staged = store.clone();
    let mut ids = Vec::with_capacity(rows.len());

    for (row, values) in rows.iter().enumerate() {
        let at_row = |source: AliasError| TableError::Alias { row, source };

        let id = match values.iter().find_map(|value| staged.get(value)) {
            Some(id) => id,
            None if options.expect_new => staged
                .merge_by_aliases(values.iter().cloned(), true)
                .map_err(at_row)?,
            None => {
                return Err(at_row(AliasError::UnknownAlias {
                    aliases: values.clone(),
                }));
            }
        };

        if options.collect_new {
            staged.add_aliases(id, values.iter().cloned()).map_err(at_row)?;
        }
        ids.push(id);
    }

    tracing::debug!(
        rows = table.len(),
        created = staged.entity_count() - store.entity_count(),
        "bound table rows to entities"
    );
    Ok((staged, ids))
}

/// Derives one entity ID per row of `table`.
///
/// Candidates are tried left to right per row and the first value already
/// known wins. Blank cells are skipped. See [`BindingOptions`] for how
/// unknown rows and extra aliases are handled.
///
/// ```
/// use rosterlink::{derive_entity_column, AliasStore, BindingOptions, ColumnRef, Table};
///
/// let mut store = AliasStore::new();
/// store.merge_by_aliases(["student@gmail.com", "Student Name"], true).unwrap();
///
/// let table = Table::from_rows(["sis_id", "st_name"], vec![vec!["name1", "Student Name"]]).unwrap();
/// let ids = derive_entity_column(
///     &mut store,
///     &table,
///     &[ColumnRef::named("sis_id"), ColumnRef::named("st_name")],
///     BindingOptions::default(),
/// )
/// .unwrap();
/// assert_eq!(ids[0].get(), 400);
/// assert_eq!(store.id_of("name1").unwrap(), ids[0]);
/// ```
///
/// # Errors
/// - `NoCandidates`, `DuplicateCandidate`, `MissingColumn`,
///   `MisalignedColumn` for bad arguments
/// - `Alias { row, .. }` wrapping `UnknownAlias` (with every candidate
///   value of the row) when a row is unknown and `expect_new` is off, or
///   any conflict raised while registering aliases
pub fn derive_entity_column<K: fmt::Display>(
    store: &mut AliasStore,
    table: &Table<K>,
    candidates: &[ColumnRef],
    options: BindingOptions,
) -> Result<Vec<EntityId>, TableError> {
    let (staged, ids) = bind_rows(store, table, candidates, options)?;
    *store = staged;
    Ok(ids)
}

/// Re-keys `table` by the entity each row resolves to.
///
/// # Errors
/// Everything [`derive_entity_column`] returns, plus `DuplicateEntityKey`
/// when two rows resolve to one entity. The store is unchanged on error.
pub fn reindex_by_entity<K: fmt::Display>(
    store: &mut AliasStore,
    table: Table<K>,
    candidates: &[ColumnRef],
    options: BindingOptions,
) -> Result<Table<EntityId>, TableError> {
    let (staged, ids) = bind_rows(store, &table, candidates, options)?;

    let mut first_rows: HashMap<EntityId, usize> = HashMap::with_capacity(ids.len());
    for (row, id) in ids.iter().enumerate() {
        if let Some(&first_row) = first_rows.get(id) {
            return Err(TableError::DuplicateEntityKey {
                id: *id,
                first_row,
                second_row: row,
            });
        }
        first_rows.insert(*id, row);
    }

    *store = staged;
    Ok(table.with_keys(ENTITY_KEY, ids))
}

/// Fluent builder over candidates and [`BindingOptions`].
///
/// # Example
/// ```rust,ignore
/// let ids = EntityColumnBuilder::new()
///     .candidate("SIS Login ID")
///     .candidate("Student")
///     .expect_new(true)
///     .derive(&mut store, &gradebook)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct EntityColumnBuilder {
    candidates: Vec<ColumnRef>,
    options: BindingOptions,
}

impl EntityColumnBuilder {
    /// Creates a builder with no candidates and default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a candidate (lowest priority so far).
    #[must_use]
    pub fn candidate(mut self, candidate: impl Into<ColumnRef>) -> Self {
        self.candidates.push(candidate.into());
        self
    }

    /// Appends several candidates in priority order.
    #[must_use]
    pub fn candidates<I, C>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnRef>,
    {
        self.candidates.extend(candidates.into_iter().map(Into::into));
        self
    }

    /// Sets [`BindingOptions::expect_new`].
    #[must_use]
    pub fn expect_new(mut self, expect_new: bool) -> Self {
        self.options.expect_new = expect_new;
        self
    }

    /// Sets [`BindingOptions::collect_new`].
    #[must_use]
    pub fn collect_new(mut self, collect_new: bool) -> Self {
        self.options.collect_new = collect_new;
        self
    }

    /// Replaces both options.
    #[must_use]
    pub fn options(mut self, options: BindingOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs [`derive_entity_column`].
    ///
    /// # Errors
    /// See [`derive_entity_column`].
    pub fn derive<K: fmt::Display>(
        &self,
        store: &mut AliasStore,
        table: &Table<K>,
    ) -> Result<Vec<EntityId>, TableError> {
        derive_entity_column(store, table, &self.candidates, self.options)
    }

    /// Runs [`reindex_by_entity`].
    ///
    /// # Errors
    /// See [`reindex_by_entity`].
    pub fn reindex<K: fmt::Display>(
        &self,
        store: &mut AliasStore,
        table: Table<K>,
    ) -> Result<Table<EntityId>, TableError> {
        reindex_by_entity(store, table, &self.candidates, self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: Vec<Vec<&str>>) -> Table {
        Table::from_rows(columns.iter().copied(), rows).unwrap()
    }

    fn keyed(key_name: &str, columns: &[&str], rows: Vec<(&str, Vec<&str>)>) -> Table {
        let mut table = Table::new(key_name, columns.iter().copied()).unwrap();
        for (key, cells) in rows {
            table.push_row(key.to_string(), cells).unwrap();
        }
        table
    }

    const EXACT: BindingOptions = BindingOptions {
        expect_new: false,
        collect_new: false,
    };

    #[test]
    fn test_single_column() {
        let mut store = AliasStore::new();
        store.new_entity(["student1"]).unwrap();
        store.new_entity(["student2"]).unwrap();
        let t = table(&["name", "grade"], vec![vec!["student1", "90"], vec!["student2", "85"]]);

        let ids = derive_entity_column(&mut store, &t, &["name".into()], EXACT).unwrap();
        assert_eq!(ids.iter().map(|id| id.get()).collect::<Vec<_>>(), vec![400, 401]);
    }

    #[test]
    fn test_first_known_candidate_wins_and_collects_the_rest() {
        let mut store = AliasStore::new();
        let id = store.new_entity(["student1"]).unwrap();
        let t = table(&["name", "nickname", "grade"], vec![vec!["student1", "stu1", "90"]]);

        let ids = EntityColumnBuilder::new()
            .candidate("name")
            .candidate("nickname")
            .collect_new(true)
            .derive(&mut store, &t)
            .unwrap();
        assert_eq!(ids, vec![id]);
        assert_eq!(store.id_of("stu1").unwrap(), id);
    }

    #[test]
    fn test_later_candidate_can_match() {
        let mut store = AliasStore::new();
        let id = store.new_entity(["student1"]).unwrap();
        let t = table(&["name", "nickname"], vec![vec!["student1", "stu1"]]);

        let ids = derive_entity_column(
            &mut store,
            &t,
            &["nickname".into(), "name".into()],
            BindingOptions::default(),
        )
        .unwrap();
        assert_eq!(ids, vec![id]);
        assert_eq!(store.id_of("stu1").unwrap(), id);
    }

    #[test]
    fn test_priority_is_strictly_left_to_right() {
        let mut store = AliasStore::new();
        let by_email = store.new_entity(["a@uni.edu"]).unwrap();
        let by_name = store.new_entity(["Ann Lee"]).unwrap();
        let t = table(&["email", "name"], vec![vec!["a@uni.edu", "Ann Lee"]]);

        let ids = derive_entity_column(&mut store, &t, &["email".into(), "name".into()], EXACT).unwrap();
        assert_eq!(ids, vec![by_email]);
        let ids = derive_entity_column(&mut store, &t, &["name".into(), "email".into()], EXACT).unwrap();
        assert_eq!(ids, vec![by_name]);
    }

    #[test]
    fn test_row_key_candidate() {
        let mut store = AliasStore::new();
        let id = store.new_entity(["student1"]).unwrap();
        let t = keyed("login", &["grade"], vec![("student1", vec!["90"])]);

        let ids = derive_entity_column(&mut store, &t, &[ColumnRef::parse("@key")], EXACT).unwrap();
        assert_eq!(ids, vec![id]);
    }

    #[test]
    fn test_external_candidate() {
        let mut store = AliasStore::new();
        let id = store.new_entity(["student1"]).unwrap();
        let t = table(&["grade"], vec![vec!["90"]]);

        let ids =
            derive_entity_column(&mut store, &t, &[ColumnRef::external(["student1"])], EXACT).unwrap();
        assert_eq!(ids, vec![id]);

        let err = derive_entity_column(&mut store, &t, &[ColumnRef::external(["a", "b"])], EXACT)
            .unwrap_err();
        assert_eq!(err, TableError::MisalignedColumn { expected: 1, actual: 2 });
    }

    #[test]
    fn test_expect_new_creates_entities_from_all_candidates() {
        let mut store = AliasStore::new();
        let t = table(&["email", "name"], vec![vec!["new@uni.edu", "New Student"]]);

        let ids = derive_entity_column(
            &mut store,
            &t,
            &["email".into(), "name".into()],
            BindingOptions {
                expect_new: true,
                collect_new: false,
            },
        )
        .unwrap();
        assert_eq!(ids[0].get(), 400);
        assert_eq!(store.id_of("New Student").unwrap(), ids[0]);
    }

    #[test]
    fn test_unknown_row_without_expect_new_reports_candidates() {
        let mut store = AliasStore::new();
        store.new_entity(["known"]).unwrap();
        let t = table(
            &["email", "name"],
            vec![vec!["known", ""], vec!["x@uni.edu", "New Student"]],
        );

        let err = derive_entity_column(
            &mut store,
            &t,
            &["email".into(), "name".into()],
            BindingOptions::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            TableError::Alias {
                row: 1,
                source: AliasError::UnknownAlias {
                    aliases: vec!["x@uni.edu".to_string(), "New Student".to_string()],
                },
            }
        );
    }

    #[test]
    fn test_failure_leaves_store_untouched() {
        let mut store = AliasStore::new();
        store.new_entity(["student1"]).unwrap();
        let t = table(
            &["name", "nickname"],
            vec![vec!["student1", "stu1"], vec!["stranger", "str"]],
        );

        let err = derive_entity_column(
            &mut store,
            &t,
            &["name".into(), "nickname".into()],
            BindingOptions::default(),
        );
        assert!(err.is_err());
        assert!(!store.contains_alias("stu1"));
        assert_eq!(store.entity_count(), 1);
    }

    #[test]
    fn test_collecting_an_alias_owned_elsewhere_conflicts() {
        let mut store = AliasStore::new();
        store.new_entity(["student1"]).unwrap();
        store.new_entity(["stu1"]).unwrap();
        let t = table(&["name", "nickname"], vec![vec!["student1", "stu1"]]);

        let err = derive_entity_column(
            &mut store,
            &t,
            &["name".into(), "nickname".into()],
            BindingOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err.alias_error(),
            Some(AliasError::AliasConflict { .. })
        ));
    }

    #[test]
    fn test_blank_row_with_expect_new_fails() {
        let mut store = AliasStore::new();
        let t = table(&["name"], vec![vec!["  "]]);
        let err = derive_entity_column(&mut store, &t, &["name".into()], BindingOptions::introducing())
            .unwrap_err();
        assert_eq!(
            err,
            TableError::Alias {
                row: 0,
                source: AliasError::EmptyAliases,
            }
        );
    }

    #[test]
    fn test_argument_validation() {
        let mut store = AliasStore::new();
        let t = table(&["name"], vec![vec!["student1"]]);

        assert_eq!(
            derive_entity_column(&mut store, &t, &[], EXACT).unwrap_err(),
            TableError::NoCandidates
        );
        assert!(matches!(
            derive_entity_column(&mut store, &t, &["name".into(), "name".into()], EXACT).unwrap_err(),
            TableError::DuplicateCandidate { .. }
        ));
        assert!(matches!(
            derive_entity_column(&mut store, &t, &[ColumnRef::RowKey, ColumnRef::RowKey], EXACT)
                .unwrap_err(),
            TableError::DuplicateCandidate { .. }
        ));
        assert_eq!(
            derive_entity_column(&mut store, &t, &["email".into()], EXACT).unwrap_err(),
            TableError::MissingColumn { column: "email".to_string() }
        );
    }

    #[test]
    fn test_same_alias_on_several_rows() {
        let mut store = AliasStore::new();
        store.new_entity(["student1"]).unwrap();
        let t = table(&["name", "grade"], vec![vec!["student1", "90"], vec!["student1", "85"]]);
        let ids = derive_entity_column(&mut store, &t, &["name".into()], EXACT).unwrap();
        assert_eq!(ids[0], ids[1]);
    }

    #[test]
    fn test_reindex_replaces_key() {
        let mut store = AliasStore::new();
        store.new_entity(["student1"]).unwrap();
        store.new_entity(["student2"]).unwrap();
        let t = table(&["name", "grade"], vec![vec!["student1", "90"], vec!["student2", "85"]]);

        let by_id = reindex_by_entity(&mut store, t, &["name".into()], EXACT).unwrap();
        assert_eq!(by_id.key_name(), ENTITY_KEY);
        assert_eq!(by_id.key_strings(), vec!["400", "401"]);
        assert_eq!(by_id.column("grade").unwrap(), vec!["90", "85"]);
    }

    #[test]
    fn test_reindex_with_new_entities_and_collected_aliases() {
        let mut store = AliasStore::new();
        store.new_entity(["student1"]).unwrap();
        let t = table(&["name", "nickname", "grade"], vec![vec!["student1", "stu1", "90"]]);

        let by_id = EntityColumnBuilder::new()
            .candidates(["name", "nickname"])
            .options(BindingOptions::introducing())
            .reindex(&mut store, t)
            .unwrap();
        assert_eq!(by_id.keys()[0].get(), 400);
        assert_eq!(store.id_of("stu1").unwrap().get(), 400);
    }

    #[test]
    fn test_reindex_rejects_duplicate_entities_without_mutating() {
        let mut store = AliasStore::new();
        store.new_entity(["student1"]).unwrap();
        let t = table(
            &["name", "nickname"],
            vec![vec!["student1", "a"], vec!["student1", "b"]],
        );

        let err = reindex_by_entity(
            &mut store,
            t,
            &["name".into(), "nickname".into()],
            BindingOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TableError::DuplicateEntityKey {
                first_row: 0,
                second_row: 1,
                ..
            }
        ));
        assert!(!store.contains_alias("a"));
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: BindingOptions = serde_json::from_str(r#"{"expect_new": true}"#).unwrap();
        assert_eq!(options, BindingOptions::introducing());
        let options: BindingOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, BindingOptions::default());
    }
}
