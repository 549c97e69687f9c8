//! Explicit registry mapping event names to decoders.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;

use crate::aggregate::Event;
use crate::error::ManifestError;

type Decoder<E> = Box<dyn Fn(&[u8]) -> Result<E, serde_json::Error> + Send + Sync>;

/// Event type manifest: name → decoder producing the domain event type `E`.
///
/// Constructed once at startup and passed by reference to whatever replays
/// events; there is no global registry.
pub struct Manifest<E> {
    decoders: HashMap<String, Decoder<E>>,
}

impl<E> Manifest<E> {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register a decoder under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, decoder: F) -> Result<(), ManifestError>
    where
        F: Fn(&[u8]) -> Result<E, serde_json::Error> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.decoders.contains_key(&name) {
            return Err(ManifestError::DuplicateEventType(name));
        }
        self.decoders.insert(name, Box::new(decoder));
        Ok(())
    }

    /// Register `T`, decoded from JSON and converted into `E`.
    pub fn register_json<T>(&mut self, name: impl Into<String>) -> Result<(), ManifestError>
    where
        T: DeserializeOwned + Into<E> + 'static,
        E: 'static,
    {
        self.register(name, |bytes: &[u8]| serde_json::from_slice::<T>(bytes).map(Into::into))
    }

    /// Decode a payload registered under `name`.
    pub fn for_name(&self, name: &str, payload: &[u8]) -> Result<E, ManifestError> {
        let decoder = self
            .decoders
            .get(name)
            .ok_or_else(|| ManifestError::UnknownEventType(name.to_string()))?;
        decoder(payload).map_err(|source| ManifestError::Decode {
            name: name.to_string(),
            source,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.decoders.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<E: Event> Manifest<E> {
    /// The registered name for `event`; unregistered events are an error.
    pub fn key_for<'e>(&self, event: &'e E) -> Result<&'e str, ManifestError> {
        let name = event.name();
        if !self.contains(name) {
            return Err(ManifestError::UnknownEventType(name.to_string()));
        }
        Ok(name)
    }
}

impl<E> Default for Manifest<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Manifest<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manifest")
            .field("events", &self.names())
            .finish()
    }
}
