use pokedex_core::db::open_db_in_memory;
use pokedex_core::{
    CreatePokemon, PaginationQuery, PokemonRepository, PokemonService, PokemonServiceError,
    ServiceConfig, SqlitePokemonRepository, UpdatePokemon,
};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn service(conn: &Connection) -> PokemonService<SqlitePokemonRepository<'_>> {
    let repo = SqlitePokemonRepository::try_new(conn).unwrap();
    PokemonService::new(repo, &ServiceConfig::default().with_default_limit(3))
}

#[test]
fn create_lowercases_name_and_assigns_id() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let first = service
        .create(CreatePokemon::new("Pikachu").with_no(25))
        .unwrap();
    let second = service
        .create(CreatePokemon::new("BULBASAUR").with_no(1))
        .unwrap();

    assert_eq!(first.name, "pikachu");
    assert_eq!(second.name, "bulbasaur");
    assert_ne!(first.id, second.id);

    let stored = service.find_one(&first.id.to_string()).unwrap();
    assert_eq!(stored, first);
}

#[test]
fn create_keeps_opaque_fields() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let created = service
        .create(
            CreatePokemon::new("Squirtle")
                .with_no(7)
                .with_field("type", json!("water"))
                .with_field("moves", json!(["tackle", "bubble"])),
        )
        .unwrap();

    let loaded = service.find_one("squirtle").unwrap();
    assert_eq!(loaded.id, created.id);
    assert_eq!(loaded.extra.get("type"), Some(&json!("water")));
    assert_eq!(loaded.extra.get("moves"), Some(&json!(["tackle", "bubble"])));
}

#[test]
fn create_with_name_differing_only_in_case_conflicts() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    service.create(CreatePokemon::new("pikachu")).unwrap();
    let err = service.create(CreatePokemon::new("PiKaChU")).unwrap_err();

    assert_eq!(
        err,
        PokemonServiceError::Conflict(r#"pokemon exists in db {"name":"pikachu"}"#.to_string())
    );
}

#[test]
fn create_with_duplicate_no_conflicts_on_no() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    service.create(CreatePokemon::new("pikachu").with_no(25)).unwrap();
    let err = service
        .create(CreatePokemon::new("raichu").with_no(25))
        .unwrap_err();

    match err {
        PokemonServiceError::Conflict(message) => assert!(message.contains(r#"{"no":25}"#)),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn find_one_prefers_species_index_over_name() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let by_no = service.create(CreatePokemon::new("pikachu").with_no(25)).unwrap();
    service.create(CreatePokemon::new("25").with_no(300)).unwrap();

    let found = service.find_one("25").unwrap();
    assert_eq!(found.id, by_no.id);
}

#[test]
fn find_one_falls_back_to_name_when_number_has_no_match() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let named = service.create(CreatePokemon::new("151")).unwrap();

    let found = service.find_one("151").unwrap();
    assert_eq!(found.id, named.id);
}

#[test]
fn find_one_by_store_id() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    service.create(CreatePokemon::new("charmander").with_no(4)).unwrap();
    let target = service.create(CreatePokemon::new("charmeleon").with_no(5)).unwrap();

    let found = service.find_one(&target.id.to_string()).unwrap();
    assert_eq!(found.name, "charmeleon");
}

#[test]
fn find_one_all_digit_id_skips_species_index_and_resolves_by_id() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    conn.execute(
        "INSERT INTO pokemon (uuid, species_no, name) VALUES ('12345678-1234-4123-8123-123456789012', 151, 'mew');",
        [],
    )
    .unwrap();

    // Both numeric and a valid simple-form id. As a number it is far above
    // u32::MAX, so no species index can match and lookup moves on to the id.
    let query = "12345678123441238123123456789012";
    assert_eq!(service.find_one(query).unwrap().name, "mew");

    service.remove(query).unwrap();
    let err = service.find_one(query).unwrap_err();
    assert!(matches!(err, PokemonServiceError::NotFound(ref message) if message.contains(query)));
}

#[test]
fn find_one_reads_hex_literal_as_species_index() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let raichu = service.create(CreatePokemon::new("raichu").with_no(26)).unwrap();

    assert_eq!(service.find_one("0x1A").unwrap().id, raichu.id);
    assert_eq!(service.find_one("0b11010").unwrap().id, raichu.id);
}

#[test]
fn find_one_by_name_ignores_case() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let created = service.create(CreatePokemon::new("pikachu")).unwrap();

    assert_eq!(service.find_one("Pikachu").unwrap().id, created.id);
    assert_eq!(service.find_one("pikachu").unwrap().id, created.id);
}

#[test]
fn find_one_unresolvable_query_is_not_found_with_query_text() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    service.create(CreatePokemon::new("pikachu").with_no(25)).unwrap();

    let unknown_id = Uuid::new_v4().to_string();
    for query in ["MissingNo", "999", unknown_id.as_str()] {
        let err = service.find_one(query).unwrap_err();
        assert_eq!(err.status_code(), 404);
        match err {
            PokemonServiceError::NotFound(message) => assert!(message.contains(query)),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

#[test]
fn find_all_paginates_in_insertion_order() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    for (no, name) in [(3, "venusaur"), (1, "bulbasaur"), (2, "ivysaur"), (4, "charmander")] {
        service.create(CreatePokemon::new(name).with_no(no)).unwrap();
    }

    let page = service
        .find_all(&PaginationQuery {
            limit: Some(2),
            offset: Some(1),
        })
        .unwrap();
    let names: Vec<_> = page.iter().map(|pokemon| pokemon.name.as_str()).collect();
    assert_eq!(names, ["bulbasaur", "ivysaur"]);
}

#[test]
fn find_all_uses_default_limit_and_no_skip() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    for (no, name) in [(1, "a"), (2, "b"), (3, "c"), (4, "d")] {
        service.create(CreatePokemon::new(name).with_no(no)).unwrap();
    }

    let page = service.find_all(&PaginationQuery::default()).unwrap();
    assert_eq!(page.len(), 3);
    assert_eq!(page[0].name, "a");

    let past_end = service
        .find_all(&PaginationQuery {
            limit: None,
            offset: Some(10),
        })
        .unwrap();
    assert!(past_end.is_empty());
}

#[test]
fn update_lowercases_name_and_returns_merged_view() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let created = service
        .create(
            CreatePokemon::new("pikachu")
                .with_no(25)
                .with_field("type", json!("electric")),
        )
        .unwrap();

    let merged = service
        .update(
            &created.id.to_string(),
            UpdatePokemon::name("RAICHU").with_field("stage", json!(2)),
        )
        .unwrap();

    assert_eq!(merged.id, created.id);
    assert_eq!(merged.name, "raichu");
    assert_eq!(merged.no, Some(25));
    assert_eq!(merged.extra.get("type"), Some(&json!("electric")));
    assert_eq!(merged.extra.get("stage"), Some(&json!(2)));

    let stored = service.find_one("raichu").unwrap();
    assert_eq!(stored, merged);
}

#[test]
fn update_resolves_target_by_species_index() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let created = service.create(CreatePokemon::new("eevee").with_no(133)).unwrap();
    let merged = service
        .update("133", UpdatePokemon::default().with_no(134))
        .unwrap();

    assert_eq!(merged.id, created.id);
    assert_eq!(service.find_one("134").unwrap().name, "eevee");
}

#[test]
fn update_missing_target_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let err = service
        .update("ghost", UpdatePokemon::name("gastly"))
        .unwrap_err();
    assert!(matches!(err, PokemonServiceError::NotFound(ref message) if message.contains("ghost")));
}

#[test]
fn update_into_existing_name_conflicts_and_keeps_record() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    service.create(CreatePokemon::new("pikachu").with_no(25)).unwrap();
    let raichu = service.create(CreatePokemon::new("raichu").with_no(26)).unwrap();

    let err = service
        .update("26", UpdatePokemon::name("Pikachu"))
        .unwrap_err();
    assert_eq!(
        err,
        PokemonServiceError::Conflict(r#"pokemon exists in db {"name":"pikachu"}"#.to_string())
    );

    let unchanged = service.find_one(&raichu.id.to_string()).unwrap();
    assert_eq!(unchanged.name, "raichu");
}

#[test]
fn remove_existing_then_lookup_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let created = service.create(CreatePokemon::new("ditto").with_no(132)).unwrap();
    let id = created.id.to_string();

    service.remove(&id).unwrap();

    let err = service.find_one(&id).unwrap_err();
    assert!(matches!(err, PokemonServiceError::NotFound(_)));
}

#[test]
fn remove_nonexistent_id_is_bad_request() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let missing = Uuid::new_v4().to_string();
    let err = service.remove(&missing).unwrap_err();

    assert_eq!(err.status_code(), 400);
    match err {
        PokemonServiceError::BadRequest(message) => assert!(message.contains(&missing)),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn remove_does_not_resolve_by_name() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    service.create(CreatePokemon::new("mew").with_no(151)).unwrap();

    assert!(matches!(
        service.remove("mew"),
        Err(PokemonServiceError::BadRequest(_))
    ));
    assert!(service.find_one("mew").is_ok());
}

#[test]
fn repository_strips_reserved_payload_keys() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePokemonRepository::try_new(&conn).unwrap();

    let created = repo
        .insert(&CreatePokemon::new("onix").with_field("id", json!("forged")))
        .unwrap();
    let payload: String = conn
        .query_row(
            "SELECT payload FROM pokemon WHERE uuid = ?1;",
            [created.id.to_string()],
            |row| row.get(0),
        )
        .unwrap();

    assert_eq!(payload, "{}");
}
