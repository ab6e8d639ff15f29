//! Pokemon store contract and its SQLite implementation.
//!
//! # Responsibility
//! - Provide find/create/update/delete primitives over the `pokemon` table.
//! - Store opaque fields as a JSON payload next to the indexed columns.
//! - Translate SQLite UNIQUE failures into a duplicate-key signal carrying the
//!   offending field and value.
//!
//! # Invariants
//! - The repository stores names as given; normalization belongs to callers.
//! - Reserved keys are stripped from payloads before they are written.
//! - List order is insertion order (`rowid`), no other sort is applied.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::pokemon::{
    without_reserved, CreatePokemon, Payload, Pokemon, PokemonId, UpdatePokemon,
};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, ToSql};
use serde_json::{json, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const POKEMON_SELECT_SQL: &str = "SELECT
    uuid,
    species_no,
    name,
    payload
FROM pokemon";

static UNIQUE_FAILURE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"UNIQUE constraint failed: (?:\w+\.)?(\w+)").expect("valid unique failure regex")
});

pub type RepoResult<T> = Result<T, RepoError>;

/// Error for pokemon persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// A write collided with a uniqueness constraint.
    DuplicateKey { field: String, value: Value },
    NotFound(PokemonId),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::DuplicateKey { field, value } => {
                write!(f, "duplicate key: {field}={value}")
            }
            Self::NotFound(id) => write!(f, "pokemon not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted pokemon data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}; open it with db::open_db"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Offset/limit options for listing records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PokemonListQuery {
    /// `None` returns every remaining row.
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Store contract for pokemon records.
pub trait PokemonRepository {
    /// Inserts a record and returns it with its assigned id.
    fn insert(&self, new: &CreatePokemon) -> RepoResult<Pokemon>;
    fn list(&self, query: &PokemonListQuery) -> RepoResult<Vec<Pokemon>>;
    fn find_by_no(&self, no: i64) -> RepoResult<Option<Pokemon>>;
    fn find_by_id(&self, id: PokemonId) -> RepoResult<Option<Pokemon>>;
    fn find_by_name(&self, name: &str) -> RepoResult<Option<Pokemon>>;
    /// Applies the fields present in `update` to the stored record.
    fn update(&self, id: PokemonId, update: &UpdatePokemon) -> RepoResult<()>;
    /// Deletes by exact id and returns the number of removed rows.
    fn delete_by_id(&self, id: PokemonId) -> RepoResult<usize>;
}

/// SQLite-backed pokemon repository.
pub struct SqlitePokemonRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePokemonRepository<'conn> {
    /// Wraps a connection returned by `db::open_db` or `db::open_db_in_memory`.
    ///
    /// Rejects connections whose schema has not been migrated.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version = current_user_version(conn)?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }

        let has_table: bool = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'pokemon'
            );",
            [],
            |row| row.get(0),
        )?;
        if !has_table {
            return Err(RepoError::MissingRequiredTable("pokemon"));
        }

        Ok(Self { conn })
    }

    fn find_one_where(&self, clause: &str, value: &dyn ToSql) -> RepoResult<Option<Pokemon>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{POKEMON_SELECT_SQL} WHERE {clause} LIMIT 1;"))?;
        let mut rows = stmt.query([value])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_pokemon_row(row)?)),
            None => Ok(None),
        }
    }
}

impl PokemonRepository for SqlitePokemonRepository<'_> {
    fn insert(&self, new: &CreatePokemon) -> RepoResult<Pokemon> {
        let record = Pokemon {
            id: Uuid::new_v4(),
            no: new.no,
            name: new.name.clone(),
            extra: without_reserved(&new.extra),
        };

        self.conn
            .execute(
                "INSERT INTO pokemon (uuid, species_no, name, payload) VALUES (?1, ?2, ?3, ?4);",
                params![
                    record.id.to_string(),
                    record.no,
                    record.name.as_str(),
                    payload_to_db(&record.extra)?,
                ],
            )
            .map_err(|err| {
                classify_write_error(err, |field| {
                    conflicting_value(field, record.id, record.no, Some(&record.name))
                })
            })?;

        Ok(record)
    }

    fn list(&self, query: &PokemonListQuery) -> RepoResult<Vec<Pokemon>> {
        let mut stmt = self.conn.prepare(&format!(
            "{POKEMON_SELECT_SQL} ORDER BY rowid ASC LIMIT ?1 OFFSET ?2;"
        ))?;

        let limit = query.limit.map_or(-1, i64::from);
        let mut rows = stmt.query(params![limit, i64::from(query.offset)])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_pokemon_row(row)?);
        }

        Ok(records)
    }

    fn find_by_no(&self, no: i64) -> RepoResult<Option<Pokemon>> {
        self.find_one_where("species_no = ?1", &no)
    }

    fn find_by_id(&self, id: PokemonId) -> RepoResult<Option<Pokemon>> {
        self.find_one_where("uuid = ?1", &id.to_string())
    }

    fn find_by_name(&self, name: &str) -> RepoResult<Option<Pokemon>> {
        self.find_one_where("name = ?1", &name)
    }

    fn update(&self, id: PokemonId, update: &UpdatePokemon) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;

        let stored_payload: Option<String> = tx
            .query_row(
                "SELECT payload FROM pokemon WHERE uuid = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(stored_payload) = stored_payload else {
            return Err(RepoError::NotFound(id));
        };

        let mut payload = payload_from_db(&stored_payload)?;
        payload.extend(without_reserved(&update.extra));

        tx.execute(
            "UPDATE pokemon
             SET
                name = COALESCE(?2, name),
                species_no = COALESCE(?3, species_no),
                payload = ?4,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                id.to_string(),
                update.name.as_deref(),
                update.no,
                payload_to_db(&payload)?,
            ],
        )
        .map_err(|err| {
            classify_write_error(err, |field| {
                conflicting_value(field, id, update.no, update.name.as_deref())
            })
        })?;

        tx.commit()?;
        Ok(())
    }

    fn delete_by_id(&self, id: PokemonId) -> RepoResult<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM pokemon WHERE uuid = ?1;", [id.to_string()])?;
        Ok(deleted)
    }
}

/// Maps a failed write, recognizing uniqueness violations.
///
/// `value_of` resolves the value the write tried to store for a column.
fn classify_write_error<F>(err: rusqlite::Error, value_of: F) -> RepoError
where
    F: FnOnce(&str) -> Value,
{
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
        if failure.code == ErrorCode::ConstraintViolation {
            if let Some(column) = unique_failure_column(message) {
                let field = match column {
                    "uuid" => "id",
                    "species_no" => "no",
                    other => other,
                };
                return RepoError::DuplicateKey {
                    field: field.to_string(),
                    value: value_of(field),
                };
            }
        }
    }

    err.into()
}

fn unique_failure_column(message: &str) -> Option<&str> {
    UNIQUE_FAILURE_RE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|column| column.as_str())
}

fn conflicting_value(field: &str, id: PokemonId, no: Option<u32>, name: Option<&str>) -> Value {
    match field {
        "id" => json!(id.to_string()),
        "no" => no.map_or(Value::Null, |no| json!(no)),
        "name" => name.map_or(Value::Null, |name| json!(name)),
        _ => Value::Null,
    }
}

fn parse_pokemon_row(row: &Row<'_>) -> RepoResult<Pokemon> {
    let uuid_text: String = row.get("uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in pokemon.uuid"))
    })?;

    let no = match row.get::<_, Option<i64>>("species_no")? {
        Some(value) => Some(u32::try_from(value).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid species index `{value}` in pokemon.species_no"
            ))
        })?),
        None => None,
    };

    let payload_text: String = row.get("payload")?;

    Ok(Pokemon {
        id,
        no,
        name: row.get("name")?,
        extra: payload_from_db(&payload_text)?,
    })
}

fn payload_to_db(payload: &Payload) -> RepoResult<String> {
    serde_json::to_string(payload)
        .map_err(|err| RepoError::InvalidData(format!("unserializable payload: {err}")))
}

fn payload_from_db(text: &str) -> RepoResult<Payload> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(RepoError::InvalidData(format!(
            "payload must be a JSON object, found `{other}` in pokemon.payload"
        ))),
        Err(err) => Err(RepoError::InvalidData(format!(
            "invalid JSON in pokemon.payload: {err}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::unique_failure_column;

    #[test]
    fn unique_failure_column_reads_qualified_column() {
        assert_eq!(
            unique_failure_column("UNIQUE constraint failed: pokemon.name"),
            Some("name")
        );
        assert_eq!(
            unique_failure_column("UNIQUE constraint failed: pokemon.species_no, pokemon.name"),
            Some("species_no")
        );
    }

    #[test]
    fn unique_failure_column_ignores_other_constraints() {
        assert_eq!(
            unique_failure_column("NOT NULL constraint failed: pokemon.name"),
            None
        );
    }
}
