//! Seams to the domain layer.

use serde::Serialize;

/// A domain event that knows its registered type name.
///
/// The name is written into the packed header and used to pick a decoder
/// from the [`Manifest`](crate::Manifest) on replay. Serialization must
/// produce exactly the JSON that decoder accepts, so enums of events are
/// typically `#[serde(untagged)]`.
pub trait Event: Serialize {
    fn name(&self) -> &str;
}

/// State rebuilt by replaying events oldest-first.
///
/// The engine only ever calls [`Aggregate::react_to`]; an error aborts
/// rehydration.
pub trait Aggregate<E> {
    type Error: std::error::Error + Send + Sync + 'static;

    fn react_to(&mut self, event: E) -> Result<(), Self::Error>;
}
