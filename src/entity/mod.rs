//! Entity layer modules.
//!
//! This module groups the entity ID type, the alias store, and the
//! resolution helpers built on top of it.

pub mod entity;
pub mod resolution;
pub mod store;

pub use entity::{EntityId, ENTITY_ID_BASE};
pub use resolution::{looks_like_person_name, Anchor, MutualAlias};
pub use store::AliasStore;
