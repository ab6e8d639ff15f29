//! Pokemon record model and request DTOs.
//!
//! # Responsibility
//! - Define the canonical stored record and its opaque payload.
//! - Define create/update/pagination inputs accepted by the service.
//! - Provide the lowercase name normalization and the client-side merge view.
//!
//! # Invariants
//! - Stored `name` values are lowercase.
//! - Payload maps never carry the reserved keys `id`, `no` or `name`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Store-assigned identifier of a pokemon record.
pub type PokemonId = Uuid;

/// Opaque fields stored alongside the indexed ones.
pub type Payload = Map<String, Value>;

/// Keys owned by the record itself; they never live inside a payload.
pub const RESERVED_FIELDS: [&str; 3] = ["id", "no", "name"];

/// Canonical stored record.
///
/// Payload fields are flattened on serialization, so a record renders as
/// one flat JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pokemon {
    pub id: PokemonId,
    /// Species index. Unique when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no: Option<u32>,
    /// Always lowercase once persisted.
    pub name: String,
    #[serde(flatten)]
    pub extra: Payload,
}

impl Pokemon {
    /// Returns this record with the update DTO overlaid.
    ///
    /// Only fields present in `update` replace stored values; payload keys are
    /// overlaid one by one. The name is taken as given, callers normalize it
    /// beforehand.
    pub fn merged_with(&self, update: &UpdatePokemon) -> Self {
        let mut merged = self.clone();
        if let Some(name) = &update.name {
            merged.name = name.clone();
        }
        if let Some(no) = update.no {
            merged.no = Some(no);
        }
        for (key, value) in without_reserved(&update.extra) {
            merged.extra.insert(key, value);
        }
        merged
    }
}

/// Input for creating one record.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CreatePokemon {
    pub name: String,
    #[serde(default)]
    pub no: Option<u32>,
    #[serde(flatten)]
    pub extra: Payload,
}

impl CreatePokemon {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_no(mut self, no: u32) -> Self {
        self.no = Some(no);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Partial update input. Absent fields are left untouched.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct UpdatePokemon {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub no: Option<u32>,
    #[serde(flatten)]
    pub extra: Payload,
}

impl UpdatePokemon {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_no(mut self, no: u32) -> Self {
        self.no = Some(no);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Offset/limit pagination input for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct PaginationQuery {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

/// Normalizes a pokemon name for storage and name lookups.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
}

/// Returns whether `value` has the shape of a store identifier.
pub fn is_valid_pokemon_id(value: &str) -> bool {
    parse_pokemon_id(value).is_some()
}

/// Parses a store identifier, returning `None` for malformed input.
pub fn parse_pokemon_id(value: &str) -> Option<PokemonId> {
    Uuid::parse_str(value).ok()
}

/// Copies a payload, dropping keys owned by the record itself.
pub fn without_reserved(payload: &Payload) -> Payload {
    payload
        .iter()
        .filter(|(key, _)| !RESERVED_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
