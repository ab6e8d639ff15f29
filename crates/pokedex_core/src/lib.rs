//! Data-access core for the pokedex record collection.
//! Owns the record model, the SQLite-backed store and the CRUD service.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, ServiceConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::pokemon::{
    is_valid_pokemon_id, CreatePokemon, PaginationQuery, Payload, Pokemon, PokemonId,
    UpdatePokemon,
};
pub use repo::pokemon_repo::{
    PokemonListQuery, PokemonRepository, RepoError, RepoResult, SqlitePokemonRepository,
};
pub use service::pokemon_service::{
    LookupStrategy, PokemonService, PokemonServiceError, ServiceResult, LOOKUP_ORDER,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
