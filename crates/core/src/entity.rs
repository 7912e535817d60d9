//! Entity trait for records that are edited in place (catalog, affiliates, sales).

/// Identity that survives edits to the record's attributes.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
