//! Reconciliation of entities that could not be matched automatically.
//!
//! Two alias universes meet here: entities already bound from the input
//! table, and alias groups (one per row) from a destination table. Groups
//! that share no alias with the store, and input entities not reached by any
//! matched group, are handed to a [`Matcher`] as display labels. Each pair
//! the matcher returns is merged back with `allow_new = false`.
//!
//! The store is only mutated after the matcher has returned, and then all
//! pairs are applied at once or not at all. A host that abandons a pending
//! [`reconcile_async`] future therefore leaves the store untouched.

pub mod matcher;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entity::{looks_like_person_name, AliasStore, EntityId};
use crate::error::{AliasError, MatcherError, ReconcileError};

pub use matcher::{matcher_fn, ExactLabelMatcher, Matcher, NoopMatcher, PromptMatcher};

/// Labels left over after automatic matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnmatchedSet {
    /// One label per unmatched input entity.
    pub inputs: Vec<String>,
    /// One label per unmatched destination group.
    pub destinations: Vec<String>,
}

impl UnmatchedSet {
    /// Returns true if both sides have labels left to pair.
    #[must_use]
    pub fn is_resolvable(&self) -> bool {
        !self.inputs.is_empty() && !self.destinations.is_empty()
    }
}

/// A pair merged by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedPair {
    /// Input-side label.
    pub input: String,
    /// Destination-side label, now an alias of `entity`.
    pub destination: String,
    /// The entity both labels denote.
    pub entity: EntityId,
}

/// Outcome of one reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    /// Labels offered to the matcher.
    pub unmatched: UnmatchedSet,
    /// Pairs merged into the store, ordered by input label.
    pub applied: Vec<MatchedPair>,
    /// When the pairs were applied.
    pub run_at: DateTime<Utc>,
}

impl ReconcileReport {
    /// Input labels the matcher left unpaired.
    pub fn unpaired_inputs(&self) -> impl Iterator<Item = &str> + '_ {
        self.unmatched
            .inputs
            .iter()
            .filter(|label| !self.applied.iter().any(|pair| &pair.input == *label))
            .map(String::as_str)
    }
}

/// Computes which input entities and destination groups are unmatched.
///
/// A destination group is matched when any of its aliases is known; an
/// unmatched group is represented by its first alias. Input IDs owning a
/// matched group's entity are dropped; the rest are labelled with
/// [`AliasStore::best_effort_alias`] preferring person names. Empty groups
/// are ignored and labels are deduplicated in first-seen order.
///
/// # Errors
/// - `ConflictingEntities` if a destination group spans several entities
/// - `UnknownEntity` for an input ID this store never assigned
pub fn find_unmatched<I, G, A, S>(
    store: &AliasStore,
    input_ids: I,
    destination_groups: G,
) -> Result<UnmatchedSet, AliasError>
where
    I: IntoIterator<Item = EntityId>,
    G: IntoIterator<Item = A>,
    A: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut matched_ids = HashSet::new();
    let mut destinations = Vec::new();
    let mut seen_destinations = HashSet::new();

    for group in destination_groups {
        let group: Vec<S> = group.into_iter().collect();
        let Some(first) = group.first() else {
            continue;
        };
        if group.iter().any(|alias| store.contains_alias(alias.as_ref())) {
            matched_ids.insert(store.id_of_any(group.iter().map(|a| a.as_ref().to_string()))?);
        } else if seen_destinations.insert(first.as_ref().to_string()) {
            destinations.push(first.as_ref().to_string());
        }
    }

    let mut inputs = Vec::new();
    let mut seen_inputs = HashSet::new();
    for id in input_ids {
        if matched_ids.contains(&id) || !seen_inputs.insert(id) {
            continue;
        }
        inputs.push(store.best_effort_alias(id, looks_like_person_name)?.to_string());
    }

    Ok(UnmatchedSet {
        inputs,
        destinations,
    })
}

fn check_injective(matches: &HashMap<String, String>) -> Result<(), ReconcileError> {
    let mut used_destinations = HashSet::new();
    for destination in matches.values() {
        if !used_destinations.insert(destination.as_str()) {
            return Err(ReconcileError::InvalidMatch {
                reason: format!("'{destination}' is matched more than once"),
            });
        }
    }
    Ok(())
}

/// Merges every pair of a matcher's mapping, all or nothing.
///
/// Labels outside the unmatched sets are left to the store: a label that
/// names no entity or one already owned elsewhere fails the merge.
fn apply_matches(
    store: &mut AliasStore,
    unmatched: UnmatchedSet,
    matches: HashMap<String, String>,
) -> Result<ReconcileReport, ReconcileError> {
    check_injective(&matches)?;

    let ordered: BTreeMap<String, String> = matches.into_iter().collect();
    let mut staged = store.clone();
    let mut applied = Vec::with_capacity(ordered.len());
    for (input, destination) in ordered {
        let entity = match staged.merge_by_aliases([input.as_str(), destination.as_str()], false) {
            Ok(entity) => entity,
            Err(source) => {
                return Err(ReconcileError::Pair {
                    input,
                    destination,
                    source,
                });
            }
        };
        applied.push(MatchedPair {
            input,
            destination,
            entity,
        });
    }
    *store = staged;

    tracing::debug!(
        unmatched_inputs = unmatched.inputs.len(),
        unmatched_destinations = unmatched.destinations.len(),
        applied = applied.len(),
        "reconciled unmatched entities"
    );
    Ok(ReconcileReport {
        unmatched,
        applied,
        run_at: Utc::now(),
    })
}

/// Runs the full protocol with a synchronous matcher.
///
/// The matcher is not consulted when either side has nothing unmatched.
///
/// ```
/// use std::collections::HashMap;
/// use rosterlink::{matcher_fn, reconcile, AliasStore};
///
/// let mut store = AliasStore::new();
/// let id = store.new_entity(["student@mail.com"]).unwrap();
///
/// let mut matcher = matcher_fn(|inputs: &[String], destinations: &[String]| {
///     Ok(HashMap::from([(inputs[0].clone(), destinations[0].clone())]))
/// });
/// reconcile(&mut store, &mut matcher, [id], [["Name One (copy 1)"]]).unwrap();
/// assert_eq!(store.id_of("Name One (copy 1)").unwrap(), id);
/// ```
///
/// # Errors
/// - `Alias` if the unmatched sets cannot be computed
/// - `Matcher` if the matcher fails
/// - `InvalidMatch` if two inputs are mapped to the same destination label
/// - `Pair` if a pair cannot be merged (conflicting entities or no known
///   label); no pair is applied in that case
pub fn reconcile<M, I, G, A, S>(
    store: &mut AliasStore,
    matcher: &mut M,
    input_ids: I,
    destination_groups: G,
) -> Result<ReconcileReport, ReconcileError>
where
    M: Matcher + ?Sized,
    I: IntoIterator<Item = EntityId>,
    G: IntoIterator<Item = A>,
    A: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let unmatched = find_unmatched(store, input_ids, destination_groups)?;
    let matches = if unmatched.is_resolvable() {
        matcher.match_labels(&unmatched.inputs, &unmatched.destinations)?
    } else {
        HashMap::new()
    };
    apply_matches(store, unmatched, matches)
}

/// Runs the full protocol with a matcher that may suspend, such as one
/// awaiting a UI event.
///
/// No timeout is imposed. Dropping the returned future before it completes
/// leaves the store unchanged.
///
/// # Errors
/// See [`reconcile`].
pub async fn reconcile_async<F, Fut, I, G, A, S>(
    store: &mut AliasStore,
    matcher: F,
    input_ids: I,
    destination_groups: G,
) -> Result<ReconcileReport, ReconcileError>
where
    F: FnOnce(Vec<String>, Vec<String>) -> Fut,
    Fut: Future<Output = Result<HashMap<String, String>, MatcherError>>,
    I: IntoIterator<Item = EntityId>,
    G: IntoIterator<Item = A>,
    A: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let unmatched = find_unmatched(store, input_ids, destination_groups)?;
    let matches = if unmatched.is_resolvable() {
        matcher(unmatched.inputs.clone(), unmatched.destinations.clone()).await?
    } else {
        HashMap::new()
    };
    apply_matches(store, unmatched, matches)
}
