//! Entity identifiers.
//!
//! Every student (or other real-world entity) reconciled during a run gets
//! one `EntityId`. Aliases come and go from the store, but the ID handed out
//! for an entity never changes for the lifetime of the store.

use std::fmt;

use serde::Serialize;

/// First ID handed out by an [`AliasStore`](crate::AliasStore).
///
/// Kept well away from zero so IDs stand out next to row numbers, point
/// totals and roster numbers in the same tables.
pub const ENTITY_ID_BASE: u32 = 400;

/// Opaque, stable handle for an entity in an [`AliasStore`](crate::AliasStore).
///
/// IDs are only minted by the store: the `n`-th entity created receives
/// `400 + n - 1`. Callers can read the number back for display or output,
/// but cannot build an `EntityId` out of an arbitrary integer.
///
/// # Examples
///
/// ```
/// use rosterlink::AliasStore;
///
/// let mut store = AliasStore::new();
/// let id = store.new_entity(["student1"]).unwrap();
/// assert_eq!(id.get(), 400);
/// assert_eq!(id.to_string(), "400");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Builds the ID for the entity stored at `index` in the store arena.
    pub(crate) fn from_index(index: usize) -> Self {
        let offset = u32::try_from(index).unwrap_or(u32::MAX - ENTITY_ID_BASE);
        Self(ENTITY_ID_BASE.saturating_add(offset))
    }

    /// Position of this entity in the store arena.
    pub(crate) fn index(self) -> usize {
        (self.0 - ENTITY_ID_BASE) as usize
    }

    /// Returns the numeric value of the ID.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<EntityId> for u32 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}
