//! Entity resolution helpers.
//!
//! The store owns identity; this module holds the pieces used to *choose*
//! among identities and aliases: the name-likeness heuristic that picks a
//! display label, and the result type of
//! [`AliasStore::mutual_alias`](crate::AliasStore::mutual_alias).

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::entity::EntityId;

fn parenthesized_suffix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // From the first '(' to the last ')'.
    PATTERN.get_or_init(|| Regex::new(r"\(.*\)").expect("static pattern compiles"))
}

/// Best-effort check that a string reads like a person's display name, as
/// it would appear in an LMS roster or a web profile.
///
/// This is a preference, not a validator: it only needs to rank
/// `"Student One"` above `"student1"`, `"s1@uni.edu"` or `"1093"`.
///
/// Rules: one parenthesized suffix such as `"(copy 2)"` is ignored; any
/// ASCII digit or comma rejects, while other numerics such as `'½'` do not;
/// at least two words are required, and the first and last word must each
/// contain an uppercase letter or a non-letter (which admits `"d'Angelo"`).
///
/// ```
/// use rosterlink::looks_like_person_name;
///
/// let samples = ["Name One (copy 1)", "Name One (copy 2)", "name1", "1"];
/// let verdicts: Vec<bool> = samples.iter().map(|s| looks_like_person_name(s)).collect();
/// assert_eq!(verdicts, [true, true, false, false]);
/// ```
#[must_use]
pub fn looks_like_person_name(s: &str) -> bool {
    let stripped = parenthesized_suffix().replacen(s, 1, "");

    if stripped.chars().any(|c| c.is_ascii_digit() || c == ',') {
        return false;
    }

    let words: Vec<&str> = stripped.split_whitespace().collect();
    if words.len() < 2 {
        return false;
    }

    let marked = |word: &str| word.chars().any(|c| c.is_uppercase() || !c.is_alphabetic());
    marked(words[0]) && marked(words[words.len() - 1])
}

/// How an entity is identified for [`AliasStore::mutual_alias`](crate::AliasStore::mutual_alias).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor<'a> {
    /// By ID.
    Entity(EntityId),
    /// By any alias the entity owns.
    Alias(&'a str),
}

impl From<EntityId> for Anchor<'_> {
    fn from(id: EntityId) -> Self {
        Self::Entity(id)
    }
}

impl<'a> From<&'a str> for Anchor<'a> {
    fn from(alias: &'a str) -> Self {
        Self::Alias(alias)
    }
}

impl<'a> From<&'a String> for Anchor<'a> {
    fn from(alias: &'a String) -> Self {
        Self::Alias(alias.as_str())
    }
}

/// Aliases an entity shares with an external vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutualAlias {
    /// No shared alias.
    None,
    /// Exactly one shared alias.
    One(String),
    /// Two or more shared aliases; the caller must disambiguate.
    Many(BTreeSet<String>),
}

impl MutualAlias {
    pub(crate) fn from_matches(mut matches: BTreeSet<String>) -> Self {
        match matches.len() {
            0 => Self::None,
            1 => matches.pop_first().map_or(Self::None, Self::One),
            _ => Self::Many(matches),
        }
    }

    /// The shared alias when it is unique.
    #[must_use]
    pub fn single(&self) -> Option<&str> {
        match self {
            Self::One(alias) => Some(alias),
            Self::None | Self::Many(_) => None,
        }
    }

    /// Returns true when nothing is shared.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}
