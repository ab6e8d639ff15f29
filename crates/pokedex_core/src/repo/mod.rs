//! Repository layer for the pokedex document store.
//!
//! # Responsibility
//! - Define the store contract consumed by the service.
//! - Keep SQL and row decoding details away from service orchestration.
//!
//! # Invariants
//! - Uniqueness violations surface as `RepoError::DuplicateKey`, never as a
//!   raw SQLite error.

pub mod pokemon_repo;
