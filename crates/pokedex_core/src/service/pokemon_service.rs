//! Pokemon use-case service.
//!
//! # Responsibility
//! - Provide create/list/find/update/remove entry points for request layers.
//! - Resolve free-form queries by species index, store id, then name.
//! - Classify store failures into caller-facing error kinds.
//!
//! # Invariants
//! - Names are lowercased before every write and every name lookup.
//! - Store internals never reach callers; unclassified failures are logged
//!   and returned as `Internal` with a generic message.
//! - `update` is read-then-write without a transaction (last write wins).

use crate::config::ServiceConfig;
use crate::model::pokemon::{
    is_valid_pokemon_id, normalize_name, parse_pokemon_id, CreatePokemon, PaginationQuery,
    Pokemon, UpdatePokemon,
};
use crate::repo::pokemon_repo::{PokemonListQuery, PokemonRepository, RepoError, RepoResult};
use log::{debug, error, info};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Caller-facing error kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PokemonServiceError {
    /// A write collided with an existing `no` or `name`.
    Conflict(String),
    /// No record resolves for the query.
    NotFound(String),
    /// Delete target does not exist.
    BadRequest(String),
    /// Unclassified store failure; details are in the server log only.
    Internal(String),
}

impl PokemonServiceError {
    /// HTTP status conventionally used for this kind.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Conflict(_) | Self::BadRequest(_) => 400,
            Self::NotFound(_) => 404,
            Self::Internal(_) => 500,
        }
    }

    /// Stable machine-readable kind label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Conflict(message)
            | Self::NotFound(message)
            | Self::BadRequest(message)
            | Self::Internal(message) => message,
        }
    }
}

impl Display for PokemonServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl Error for PokemonServiceError {}

pub type ServiceResult<T> = Result<T, PokemonServiceError>;

/// One way of resolving a free-form query to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStrategy {
    /// Query parses as a number; match on `no`.
    SpeciesIndex,
    /// Query has the shape of a store id; match on `id`.
    StoreId,
    /// Match on the lowercased name.
    Name,
}

/// Resolution order used by `find_one` and `update`. First hit wins.
pub const LOOKUP_ORDER: [LookupStrategy; 3] = [
    LookupStrategy::SpeciesIndex,
    LookupStrategy::StoreId,
    LookupStrategy::Name,
];

impl LookupStrategy {
    /// Returns whether this strategy can apply to `query` at all.
    pub fn applies_to(self, query: &str) -> bool {
        match self {
            Self::SpeciesIndex => parse_numeric_query(query).is_some(),
            Self::StoreId => is_valid_pokemon_id(query),
            Self::Name => true,
        }
    }

    fn lookup<R: PokemonRepository>(self, repo: &R, query: &str) -> RepoResult<Option<Pokemon>> {
        match self {
            Self::SpeciesIndex => match parse_numeric_query(query).and_then(species_index) {
                Some(no) => repo.find_by_no(no),
                // Numeric but not an integer index: nothing can match.
                None => Ok(None),
            },
            Self::StoreId => match parse_pokemon_id(query) {
                Some(id) => repo.find_by_id(id),
                None => Ok(None),
            },
            Self::Name => repo.find_by_name(&normalize_name(query)),
        }
    }
}

/// Use-case service over a pokemon repository.
pub struct PokemonService<R: PokemonRepository> {
    repo: R,
    default_limit: u32,
}

impl<R: PokemonRepository> PokemonService<R> {
    /// Creates a service, capturing the default page size from `config`.
    pub fn new(repo: R, config: &ServiceConfig) -> Self {
        Self {
            repo,
            default_limit: config.default_limit,
        }
    }

    /// Creates a record with its name lowercased.
    pub fn create(&self, dto: CreatePokemon) -> ServiceResult<Pokemon> {
        let mut dto = dto;
        dto.name = normalize_name(&dto.name);

        let created = self
            .repo
            .insert(&dto)
            .map_err(|err| handle_exceptions(err, "create"))?;
        info!(
            "event=pokemon_create module=service status=ok id={}",
            created.id
        );
        Ok(created)
    }

    /// Lists records in store order.
    ///
    /// A missing limit uses the configured default page size; a missing offset
    /// skips nothing.
    pub fn find_all(&self, pagination: &PaginationQuery) -> ServiceResult<Vec<Pokemon>> {
        let query = PokemonListQuery {
            limit: Some(pagination.limit.unwrap_or(self.default_limit)),
            offset: pagination.offset.unwrap_or(0),
        };

        let records = self
            .repo
            .list(&query)
            .map_err(|err| handle_exceptions(err, "list"))?;
        debug!(
            "event=pokemon_list module=service status=ok limit={:?} offset={} count={}",
            query.limit,
            query.offset,
            records.len()
        );
        Ok(records)
    }

    /// Resolves `query` by species index, then store id, then name.
    pub fn find_one(&self, query: &str) -> ServiceResult<Pokemon> {
        for strategy in LOOKUP_ORDER {
            if !strategy.applies_to(query) {
                continue;
            }

            let found = strategy
                .lookup(&self.repo, query)
                .map_err(|err| handle_exceptions(err, "find"))?;
            if let Some(pokemon) = found {
                debug!(
                    "event=pokemon_find module=service status=ok strategy={strategy:?} id={}",
                    pokemon.id
                );
                return Ok(pokemon);
            }
        }

        Err(not_found(query))
    }

    /// Applies a partial update to the record resolved by `query`.
    ///
    /// Returns the pre-update record with the update overlaid rather than a
    /// fresh read.
    pub fn update(&self, query: &str, dto: UpdatePokemon) -> ServiceResult<Pokemon> {
        let current = self.find_one(query)?;

        let mut dto = dto;
        if let Some(name) = dto.name.as_mut() {
            *name = normalize_name(name);
        }

        self.repo
            .update(current.id, &dto)
            .map_err(|err| match err {
                RepoError::NotFound(_) => not_found(query),
                other => handle_exceptions(other, "update"),
            })?;

        info!(
            "event=pokemon_update module=service status=ok id={}",
            current.id
        );
        Ok(current.merged_with(&dto))
    }

    /// Hard-deletes the record with exactly this store id.
    ///
    /// An absent record is reported as `BadRequest`, not `NotFound`.
    pub fn remove(&self, id: &str) -> ServiceResult<()> {
        let deleted = match parse_pokemon_id(id) {
            Some(pokemon_id) => self
                .repo
                .delete_by_id(pokemon_id)
                .map_err(|err| handle_exceptions(err, "delete"))?,
            None => 0,
        };

        if deleted == 0 {
            return Err(PokemonServiceError::BadRequest(format!(
                "pokemon with id \"{id}\" not found"
            )));
        }

        info!("event=pokemon_delete module=service status=ok id={id}");
        Ok(())
    }
}

/// Maps a store failure to a caller-facing error.
///
/// Duplicate keys become `Conflict` naming the key/value pair; everything else
/// is logged and hidden behind a generic `Internal` message.
pub fn handle_exceptions(err: RepoError, action: &str) -> PokemonServiceError {
    match err {
        RepoError::DuplicateKey { field, value } => {
            let mut key_value = Map::new();
            key_value.insert(field, value);
            PokemonServiceError::Conflict(format!(
                "pokemon exists in db {}",
                Value::Object(key_value)
            ))
        }
        other => {
            error!(
                "event=pokemon_{action} module=service status=error error_code=store_failure error={other}"
            );
            PokemonServiceError::Internal(format!("can't {action} pokemon - check server logs"))
        }
    }
}

fn not_found(query: &str) -> PokemonServiceError {
    PokemonServiceError::NotFound(format!("pokemon with id, name or no \"{query}\" not found"))
}

/// Parses a query that is entirely a finite number (surrounding whitespace
/// allowed). Blank input is not numeric. Unsigned `0x`/`0o`/`0b` integer
/// literals count as numbers too.
fn parse_numeric_query(query: &str) -> Option<f64> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(value) = parse_prefixed_integer(trimmed) {
        return Some(value);
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn parse_prefixed_integer(text: &str) -> Option<f64> {
    let radix = match text.get(..2)?.to_ascii_lowercase().as_str() {
        "0x" => 16,
        "0o" => 8,
        "0b" => 2,
        _ => return None,
    };
    let digits = &text[2..];
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    // Overflow cannot be a species index anyway.
    u128::from_str_radix(digits, radix)
        .map(|value| value as f64)
        .ok()
}

fn species_index(value: f64) -> Option<i64> {
    if value.fract() != 0.0 || value < 0.0 || value > f64::from(u32::MAX) {
        return None;
    }
    Some(value as i64)
}
