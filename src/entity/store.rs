//! The alias store: the identity registry at the center of every run.
//!
//! Entities live in an arena indexed by `EntityId - 400`; each record owns an
//! ordered alias set. A hash map from alias to `EntityId` is the reverse
//! index. Both are only touched in the private `bind` helper, so the
//! alias→entity function and disjointness of alias sets hold by
//! construction.
//!
//! Every mutating operation validates completely before it mutates: a failed
//! call leaves the store exactly as it was.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::entity::resolution::{Anchor, MutualAlias};
use crate::entity::EntityId;
use crate::error::AliasError;

/// Registry mapping string aliases to stable entity IDs.
///
/// # Examples
///
/// ```
/// use rosterlink::AliasStore;
///
/// let mut store = AliasStore::new();
/// let id = store.merge_by_aliases(["student@gmail.com", "Student Name"], true).unwrap();
/// assert_eq!(store.id_of("Student Name").unwrap(), id);
/// assert_eq!(id.get(), 400);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AliasStore {
    entities: Vec<BTreeSet<String>>,
    by_alias: HashMap<String, EntityId>,
}

/// Deduplicates while keeping first-seen order.
fn collect_aliases<I, S>(aliases: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    aliases
        .into_iter()
        .map(Into::into)
        .filter(|alias| seen.insert(alias.clone()))
        .collect()
}

impl AliasStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entities created so far.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if no entity has been created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns true if `alias` is registered to any entity.
    #[must_use]
    pub fn contains_alias(&self, alias: &str) -> bool {
        self.by_alias.contains_key(alias)
    }

    /// Returns true if `id` was assigned by this store.
    #[must_use]
    pub fn contains_entity(&self, id: EntityId) -> bool {
        id.get() >= crate::entity::ENTITY_ID_BASE && id.index() < self.entities.len()
    }

    /// All entity IDs in creation order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        (0..self.entities.len()).map(EntityId::from_index)
    }

    /// Every registered alias, grouped by entity in creation order.
    pub fn all_aliases(&self) -> impl Iterator<Item = &str> + '_ {
        self.entities.iter().flatten().map(String::as_str)
    }

    fn record(&self, id: EntityId) -> Result<&BTreeSet<String>, AliasError> {
        if !self.contains_entity(id) {
            return Err(AliasError::UnknownEntity { id });
        }
        Ok(&self.entities[id.index()])
    }

    /// Registers already-validated aliases on an existing entity.
    fn bind(&mut self, id: EntityId, aliases: Vec<String>) {
        let record = &mut self.entities[id.index()];
        for alias in aliases {
            if record.insert(alias.clone()) {
                self.by_alias.insert(alias, id);
            }
        }
    }

    /// Distinct entities owning any of `aliases`, each with the first alias
    /// that hit it, in lookup order.
    fn owners(&self, aliases: &[String]) -> Vec<(EntityId, String)> {
        let mut owners: Vec<(EntityId, String)> = Vec::new();
        for alias in aliases {
            if let Some(&id) = self.by_alias.get(alias) {
                if !owners.iter().any(|(seen, _)| *seen == id) {
                    owners.push((id, alias.clone()));
                }
            }
        }
        owners
    }

    /// Creates a fresh entity holding every given alias.
    ///
    /// # Errors
    /// - `EmptyAliases` if no alias is given
    /// - `AliasAlreadyExists` if any alias is registered already, or is
    ///   given twice (`existing` is then the entity being created)
    pub fn new_entity<I, S>(&mut self, aliases: I) -> Result<EntityId, AliasError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let aliases: Vec<String> = aliases.into_iter().map(Into::into).collect();
        if aliases.is_empty() {
            return Err(AliasError::EmptyAliases);
        }
        if let Some((existing, alias)) = self.owners(&aliases).into_iter().next() {
            return Err(AliasError::AliasAlreadyExists { alias, existing });
        }

        let id = EntityId::from_index(self.entities.len());
        let mut seen = HashSet::new();
        if let Some(alias) = aliases.iter().find(|alias| !seen.insert(alias.as_str())) {
            return Err(AliasError::AliasAlreadyExists {
                alias: alias.clone(),
                existing: id,
            });
        }

        self.entities.push(BTreeSet::new());
        self.bind(id, aliases);
        Ok(id)
    }

    /// Adds aliases to an existing entity.
    ///
    /// Adding an alias the entity already has is a no-op.
    ///
    /// # Errors
    /// - `UnknownEntity` if `id` was never assigned
    /// - `AliasConflict` if an alias belongs to a different entity
    pub fn add_aliases<I, S>(&mut self, id: EntityId, aliases: I) -> Result<(), AliasError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.record(id)?;
        let aliases = collect_aliases(aliases);
        for alias in &aliases {
            match self.by_alias.get(alias) {
                Some(&existing) if existing != id => {
                    return Err(AliasError::AliasConflict {
                        alias: alias.clone(),
                        existing,
                        requested: id,
                    });
                }
                _ => {}
            }
        }
        self.bind(id, aliases);
        Ok(())
    }

    /// Asserts that `aliases` all denote one entity and records that.
    ///
    /// The aliases are added to the single existing entity any of them
    /// belongs to. If none is known, a new entity is created when
    /// `allow_new` is set.
    ///
    /// # Errors
    /// - `EmptyAliases` if no alias is given
    /// - `ConflictingEntities` if the aliases belong to more than one entity
    /// - `NoMatchingEntity` if none is known and `allow_new` is false
    pub fn merge_by_aliases<I, S>(&mut self, aliases: I, allow_new: bool) -> Result<EntityId, AliasError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let aliases = collect_aliases(aliases);
        if aliases.is_empty() {
            return Err(AliasError::EmptyAliases);
        }

        let owners = self.owners(&aliases);
        match owners.len() {
            0 if allow_new => self.new_entity(aliases),
            0 => Err(AliasError::NoMatchingEntity { aliases }),
            1 => {
                let id = owners[0].0;
                self.bind(id, aliases);
                Ok(id)
            }
            _ => Err(AliasError::ConflictingEntities { matches: owners }),
        }
    }

    /// Runs `merge_by_aliases` once per record, all or nothing.
    ///
    /// Each record lists aliases of one entity.
    ///
    /// # Errors
    /// Any error of `merge_by_aliases`; the store is left unchanged.
    pub fn add_bulk<R, I, S>(&mut self, records: R, allow_new: bool) -> Result<Vec<EntityId>, AliasError>
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut staged = self.clone();
        let ids = records
            .into_iter()
            .map(|record| staged.merge_by_aliases(record, allow_new))
            .collect::<Result<Vec<_>, _>>()?;
        *self = staged;
        Ok(ids)
    }

    /// Looks up an alias, returning `None` when it is unknown.
    #[must_use]
    pub fn get(&self, alias: &str) -> Option<EntityId> {
        self.by_alias.get(alias).copied()
    }

    /// Exact lookup of one alias.
    ///
    /// # Errors
    /// `UnknownAlias` if the alias is not registered.
    pub fn id_of(&self, alias: &str) -> Result<EntityId, AliasError> {
        self.get(alias).ok_or_else(|| AliasError::unknown(alias))
    }

    /// Exact lookup of several aliases, in order.
    ///
    /// # Errors
    /// `UnknownAlias` for the first alias that is not registered.
    pub fn id_of_each<I, S>(&self, aliases: I) -> Result<Vec<EntityId>, AliasError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        aliases.into_iter().map(|alias| self.id_of(alias.as_ref())).collect()
    }

    /// The single entity any of `aliases` belongs to, without mutating.
    ///
    /// # Errors
    /// - `UnknownAlias` (carrying every alias) if none is registered
    /// - `ConflictingEntities` if they belong to more than one entity
    pub fn id_of_any<I, S>(&self, aliases: I) -> Result<EntityId, AliasError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let aliases = collect_aliases(aliases);
        let owners = self.owners(&aliases);
        match owners.len() {
            0 => Err(AliasError::UnknownAlias { aliases }),
            1 => Ok(owners[0].0),
            _ => Err(AliasError::ConflictingEntities { matches: owners }),
        }
    }

    /// Every alias of an entity.
    ///
    /// # Errors
    /// `UnknownEntity` if `id` was never assigned.
    pub fn aliases_of(&self, id: EntityId) -> Result<&BTreeSet<String>, AliasError> {
        self.record(id)
    }

    /// Every alias of the entity owning `alias`.
    ///
    /// # Errors
    /// `UnknownAlias` if `alias` is not registered.
    pub fn aliases_of_alias(&self, alias: &str) -> Result<&BTreeSet<String>, AliasError> {
        let id = self.id_of(alias)?;
        self.record(id)
    }

    /// Picks one alias for display, preferring those matching `preferred`.
    ///
    /// Aliases are scanned in lexicographic order, so the result is
    /// deterministic: the first preferred alias, or the smallest alias when
    /// none is preferred.
    ///
    /// ```
    /// use rosterlink::{looks_like_person_name, AliasStore};
    ///
    /// let mut store = AliasStore::new();
    /// let id = store.new_entity(["student1"]).unwrap();
    /// assert_eq!(store.best_effort_alias(id, looks_like_person_name).unwrap(), "student1");
    ///
    /// store.add_aliases(id, ["Student One"]).unwrap();
    /// assert_eq!(store.best_effort_alias(id, looks_like_person_name).unwrap(), "Student One");
    /// ```
    ///
    /// # Errors
    /// `UnknownEntity` if `id` was never assigned.
    pub fn best_effort_alias<P>(&self, id: EntityId, preferred: P) -> Result<&str, AliasError>
    where
        P: Fn(&str) -> bool,
    {
        let aliases = self.record(id)?;
        let chosen = aliases
            .iter()
            .find(|alias| preferred(alias.as_str()))
            .or_else(|| aliases.iter().next())
            .ok_or(AliasError::UnknownEntity { id })?;
        Ok(chosen.as_str())
    }

    /// Intersects an entity's aliases with an externally supplied vocabulary.
    ///
    /// The entity is given by ID or by any of its aliases.
    ///
    /// # Errors
    /// `UnknownEntity` or `UnknownAlias` if the anchor does not resolve.
    pub fn mutual_alias<'a, I, S>(
        &self,
        acceptable: I,
        anchor: impl Into<Anchor<'a>>,
    ) -> Result<MutualAlias, AliasError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let aliases = match anchor.into() {
            Anchor::Entity(id) => self.aliases_of(id)?,
            Anchor::Alias(alias) => self.aliases_of_alias(alias)?,
        };
        let matches: BTreeSet<String> = acceptable
            .into_iter()
            .filter(|candidate| aliases.contains(candidate.as_ref()))
            .map(|candidate| candidate.as_ref().to_string())
            .collect();
        Ok(MutualAlias::from_matches(matches))
    }
}

impl fmt::Display for AliasStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (index, aliases) in self.entities.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {:?}", EntityId::from_index(index), aliases)?;
        }
        write!(f, "}}")
    }
}

impl Serialize for AliasStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entities.len()))?;
        for (index, aliases) in self.entities.iter().enumerate() {
            map.serialize_entry(&EntityId::from_index(index).to_string(), aliases)?;
        }
        map.end()
    }
}
