//! Domain model for the pokedex record collection.
//!
//! # Responsibility
//! - Define the stored record shape and the DTOs accepted by the service.
//! - Keep opaque payload fields separate from the indexed fields.
//!
//! # Invariants
//! - Every record is identified by a store-assigned `PokemonId`.
//! - Deletion is a hard delete; there are no tombstones.

pub mod pokemon;
