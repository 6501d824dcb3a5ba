//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Records reference each other through these identifiers (foreign-key style),
/// never through embedded object graphs.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
