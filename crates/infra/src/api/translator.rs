//! Type registry for polymorphic API items
//!
//! Box items carry their kind in a `"type"` field. A [`TypeRegistry`] maps
//! that discriminator to a deserializer producing a caller-chosen type `T`.
//! Registries are plain values passed to whoever needs them; a registry can
//! extend another, with its own registrations taking precedence.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

type Decoder<T> = Arc<dyn Fn(Value) -> Result<T, TranslateError> + Send + Sync>;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("item has no \"type\" field")]
    MissingType,

    #[error("no translation registered for type {0:?}")]
    UnknownType(String),

    #[error("invalid {type_name} item: {source}")]
    Invalid {
        type_name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Discriminator → deserializer map
pub struct TypeRegistry<T> {
    decoders: HashMap<String, Decoder<T>>,
    fallback: Option<Decoder<T>>,
}

impl<T> Default for TypeRegistry<T> {
    fn default() -> Self {
        Self { decoders: HashMap::new(), fallback: None }
    }
}

impl<T> Clone for TypeRegistry<T> {
    fn clone(&self) -> Self {
        Self { decoders: self.decoders.clone(), fallback: self.fallback.clone() }
    }
}

impl<T: 'static> TypeRegistry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `type_name` with a decoder, replacing any previous one.
    pub fn register<F>(&mut self, type_name: impl Into<String>, decoder: F) -> &mut Self
    where
        F: Fn(Value) -> Result<T, TranslateError> + Send + Sync + 'static,
    {
        self.decoders.insert(type_name.into(), Arc::new(decoder));
        self
    }

    /// Register a serde type that converts into `T`.
    pub fn register_type<U>(&mut self, type_name: impl Into<String>) -> &mut Self
    where
        U: DeserializeOwned + Into<T> + 'static,
    {
        let name = type_name.into();
        let label = name.clone();
        self.register(name, move |value| {
            serde_json::from_value::<U>(value)
                .map(Into::into)
                .map_err(|source| TranslateError::Invalid { type_name: label.clone(), source })
        })
    }

    /// Decoder for types nobody registered.
    #[must_use]
    pub fn with_fallback<F>(mut self, decoder: F) -> Self
    where
        F: Fn(Value) -> Result<T, TranslateError> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(decoder));
        self
    }

    /// New registry that sees every entry of `parent` unless overridden here.
    #[must_use]
    pub fn extend(&self, parent: &Self) -> Self {
        let mut decoders = parent.decoders.clone();
        decoders.extend(self.decoders.iter().map(|(k, v)| (k.clone(), Arc::clone(v))));
        Self { decoders, fallback: self.fallback.clone().or_else(|| parent.fallback.clone()) }
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.decoders.contains_key(type_name)
    }

    /// Decode one item by its `"type"` field.
    ///
    /// # Errors
    /// `MissingType` without a string `"type"`, `UnknownType` when nothing
    /// (not even a fallback) handles it, `Invalid` when decoding fails.
    pub fn translate(&self, item: Value) -> Result<T, TranslateError> {
        let type_name = item
            .get("type")
            .and_then(Value::as_str)
            .ok_or(TranslateError::MissingType)?
            .to_string();
        match self.decoders.get(&type_name).or(self.fallback.as_ref()) {
            Some(decode) => decode(item),
            None => Err(TranslateError::UnknownType(type_name)),
        }
    }

    /// Decode every element of a collection's `entries` array.
    ///
    /// # Errors
    /// The first item that fails to translate.
    pub fn translate_entries(&self, collection: &Value) -> Result<Vec<T>, TranslateError> {
        collection
            .get("entries")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().cloned().map(|item| self.translate(item)).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

impl<T> fmt::Debug for TypeRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.decoders.keys().collect();
        types.sort();
        f.debug_struct("TypeRegistry")
            .field("types", &types)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
