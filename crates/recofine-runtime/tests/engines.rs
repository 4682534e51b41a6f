//! End-to-end engine runs against a seeded SQLite catalog.

use std::collections::HashMap;

use chrono::Duration;
use tempfile::TempDir;

use recofine_core::{ContentType, EngineSettings, Error, ItemId, TypePair};
use recofine_runtime::{EngineKind, Orchestrator, ScopeOutcome};
use recofine_store::{NewItem, SqliteStore};

const WORDS: [&str; 8] = [
    "space", "pirate", "dragon", "racing", "zombie", "puzzle", "castle", "ninja",
];

fn open_store() -> (SqliteStore, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(dir.path().join("recofine.db")).unwrap();
    (store, dir)
}

/// Game documents built from the free-text description only.
fn settings(rows_per_chunk: usize, max_sim: usize) -> EngineSettings {
    let mut settings = EngineSettings::default();
    settings.workers = 3;
    settings.within.rows_per_chunk = rows_per_chunk;
    settings.within.max_sim = max_sim;
    settings
        .features
        .insert(ContentType::Game, vec!["short_description".into()]);
    settings
}

fn add_game(store: &SqliteStore, id: i64, description: &str) {
    store
        .upsert_item(
            &NewItem::new(ContentType::Game, id)
                .field("name", &format!("Game {}", id))
                .field("short_description", description),
        )
        .unwrap();
}

fn seed_games(store: &SqliteStore, n: usize) {
    for i in 0..n {
        let description = format!(
            "{} {} {}",
            WORDS[i % 8],
            WORDS[(i * 3 + 1) % 8],
            WORDS[(i / 3) % 8]
        );
        add_game(store, i as i64 + 1, &description);
    }
}

fn add_titled(store: &SqliteStore, ct: ContentType, id: i64, title: &str) {
    let column = if ct == ContentType::Game { "name" } else { "title" };
    store
        .upsert_item(&NewItem::new(ct, id).field(column, title))
        .unwrap();
}

#[test]
fn test_red_car_scenario() {
    let (store, _dir) = open_store();
    add_game(&store, 1, "red car");
    add_game(&store, 2, "red bike");
    add_game(&store, 3, "blue boat");

    let orchestrator = Orchestrator::new(settings(100, 2)).unwrap();
    orchestrator
        .run(EngineKind::ContentSimilarities, &store)
        .unwrap();

    let from_one = store.similars_for(ContentType::Game, &ItemId::Int(1)).unwrap();
    assert_eq!(from_one.len(), 1);
    assert_eq!(from_one[0].target_id, ItemId::Int(2));
    assert!(from_one[0].similarity > 0.1);

    assert!(store
        .similars_for(ContentType::Game, &ItemId::Int(3))
        .unwrap()
        .is_empty());
    assert!(store
        .similars(ContentType::Game)
        .unwrap()
        .iter()
        .all(|e| e.target_id != ItemId::Int(3)));
}

#[test]
fn test_results_do_not_depend_on_chunk_size() {
    let mut runs = Vec::new();
    for rows_per_chunk in [1, 7, 100] {
        let (store, _dir) = open_store();
        seed_games(&store, 40);
        let orchestrator = Orchestrator::new(settings(rows_per_chunk, 4)).unwrap();
        orchestrator
            .run(EngineKind::ContentSimilarities, &store)
            .unwrap();
        runs.push(store.similars(ContentType::Game).unwrap());
    }
    assert!(!runs[0].is_empty());
    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[0], runs[2]);
}

#[test]
fn test_edges_respect_threshold_top_k_and_self_exclusion() {
    let (store, _dir) = open_store();
    seed_games(&store, 40);
    let settings = settings(5, 3);
    let threshold = settings.within.threshold;
    Orchestrator::new(settings)
        .unwrap()
        .run(EngineKind::ContentSimilarities, &store)
        .unwrap();

    let edges = store.similars(ContentType::Game).unwrap();
    let mut per_source: HashMap<ItemId, usize> = HashMap::new();
    for edge in &edges {
        assert_ne!(edge.source_id, edge.target_id);
        assert!(edge.similarity > threshold);
        *per_source.entry(edge.source_id.clone()).or_insert(0) += 1;
    }
    assert!(per_source.values().all(|&n| n <= 3));
    // Duplicated descriptions guarantee some sources fill their quota.
    assert!(per_source.values().any(|&n| n == 3));
}

#[test]
fn test_checkpoint_gates_recompute() {
    let (store, _dir) = open_store();
    seed_games(&store, 10);
    let orchestrator = Orchestrator::new(settings(4, 5)).unwrap();
    let engine = EngineKind::ContentSimilarities.checkpoint_name();

    let first = orchestrator
        .run(EngineKind::ContentSimilarities, &store)
        .unwrap();
    assert_eq!(first.skipped(), 0);
    let checkpoint = store.last_run(engine, ContentType::Game).unwrap().unwrap();
    let edges = store.similars(ContentType::Game).unwrap();

    // Nothing changed: every scope is skipped and nothing is rewritten.
    let second = orchestrator
        .run(EngineKind::ContentSimilarities, &store)
        .unwrap();
    assert_eq!(second.skipped(), 6);
    assert_eq!(store.last_run(engine, ContentType::Game).unwrap(), Some(checkpoint));
    assert_eq!(store.similars(ContentType::Game).unwrap(), edges);

    // A game changes: only the game scope recomputes.
    add_game(&store, 11, "space pirate castle");
    store
        .record_change_event(
            ContentType::Game,
            &ItemId::Int(11),
            checkpoint + Duration::seconds(1),
        )
        .unwrap();
    let third = orchestrator
        .run(EngineKind::ContentSimilarities, &store)
        .unwrap();
    assert_eq!(third.skipped(), 5);
    let game_scope = third.scopes.iter().find(|s| s.scope == "game").unwrap();
    assert!(matches!(game_scope.outcome, ScopeOutcome::Completed { .. }));

    let after = store.last_run(engine, ContentType::Game).unwrap().unwrap();
    assert!(after >= checkpoint);
    assert!(!store
        .similars_for(ContentType::Game, &ItemId::Int(11))
        .unwrap()
        .is_empty());
}

#[test]
fn test_aborted_scope_keeps_previous_state() {
    let (store, _dir) = open_store();
    seed_games(&store, 6);
    Orchestrator::new(settings(100, 5))
        .unwrap()
        .run(EngineKind::ContentSimilarities, &store)
        .unwrap();
    let engine = EngineKind::ContentSimilarities.checkpoint_name();
    let checkpoint = store.last_run(engine, ContentType::Game).unwrap();
    let edges = store.similars(ContentType::Game).unwrap();

    store
        .record_change_event(
            ContentType::Game,
            &ItemId::Int(1),
            checkpoint.unwrap() + Duration::seconds(1),
        )
        .unwrap();
    let mut small = settings(100, 5);
    small.max_corpus_rows = 5;
    let result = Orchestrator::new(small)
        .unwrap()
        .run(EngineKind::ContentSimilarities, &store);

    assert!(matches!(result, Err(Error::Vectorize(_))));
    assert_eq!(store.last_run(engine, ContentType::Game).unwrap(), checkpoint);
    assert_eq!(store.similars(ContentType::Game).unwrap(), edges);
    assert!(store.should_run(engine, ContentType::Game).unwrap());
}

#[test]
fn test_empty_catalog_still_advances_checkpoints() {
    let (store, _dir) = open_store();
    let report = Orchestrator::new(settings(100, 10))
        .unwrap()
        .run(EngineKind::ContentSimilarities, &store)
        .unwrap();
    assert!(report
        .scopes
        .iter()
        .all(|s| s.outcome == ScopeOutcome::Completed { edges: 0 }));
    for ct in ContentType::all() {
        assert_eq!(store.count_similars(*ct).unwrap(), 0);
        assert!(!store.should_run("ContentSimilarities", *ct).unwrap());
    }
}

fn seed_titles(store: &SqliteStore) {
    add_titled(store, ContentType::Game, 1, "Star Wars");
    add_titled(store, ContentType::Game, 2, "Doom");
    add_titled(store, ContentType::Game, 3, "Tetris");
    add_titled(store, ContentType::Movie, 1, "Star Wars");
    add_titled(store, ContentType::Movie, 2, "Doom");
    add_titled(store, ContentType::Movie, 3, "Alien");
    add_titled(store, ContentType::Serie, 1, "Star Wars");
}

#[test]
fn test_cross_type_links_follow_pair_direction() {
    let (store, _dir) = open_store();
    seed_titles(&store);
    let orchestrator = Orchestrator::new(EngineSettings::default()).unwrap();
    let report = orchestrator.run(EngineKind::LinkBetweenItems, &store).unwrap();
    assert_eq!(report.scopes.len(), 4);
    assert_eq!(report.edges(), 8);

    let game_movie = TypePair::new(ContentType::Game, ContentType::Movie);
    let links = store.content_links(game_movie).unwrap();
    assert_eq!(links.len(), 2);
    for link in &links {
        assert_eq!(link.source_type, ContentType::Game);
        assert_eq!(link.target_type, ContentType::Movie);
        assert!(link.similarity > 0.8);
    }
    // Content ids are assigned in insertion order: games 1-3, movies 4-6, serie 7.
    assert_eq!(links[0].source_id, ItemId::Int(1));
    assert_eq!(links[0].target_id, ItemId::Int(4));
    assert!(store.content_links_for(3).unwrap().is_empty());

    let from_serie = store.content_links_for(7).unwrap();
    assert_eq!(from_serie.len(), 2);
    assert!(from_serie.iter().all(|l| l.source_type == ContentType::Serie));

    for pair in &orchestrator.settings().type_pairs {
        assert_ne!(pair.anchor, pair.other);
    }
}

#[test]
fn test_cross_type_checkpoints_watch_partner_types() {
    let (store, _dir) = open_store();
    seed_titles(&store);
    let orchestrator = Orchestrator::new(EngineSettings::default()).unwrap();
    orchestrator.run(EngineKind::LinkBetweenItems, &store).unwrap();
    let engine = EngineKind::LinkBetweenItems.checkpoint_name();
    assert_eq!(store.checkpoints(engine).unwrap().len(), 4);

    let pairs = orchestrator.settings().type_pairs.clone();
    let links_before: Vec<_> = pairs
        .iter()
        .map(|p| store.content_links(*p).unwrap())
        .collect();
    let checkpoints_before = store.checkpoints(engine).unwrap();

    let skipped = orchestrator.run(EngineKind::LinkBetweenItems, &store).unwrap();
    assert_eq!(skipped.skipped(), 4);
    assert_eq!(store.checkpoints(engine).unwrap(), checkpoints_before);
    for (pair, before) in pairs.iter().zip(&links_before) {
        assert_eq!(&store.content_links(*pair).unwrap(), before, "{}", pair);
    }

    // A game change reruns every anchor paired with games; tracks are
    // only paired with movies and series.
    let last = store.last_run(engine, ContentType::Game).unwrap().unwrap();
    store
        .record_change_event(ContentType::Game, &ItemId::Int(2), last + Duration::seconds(1))
        .unwrap();
    let rerun = orchestrator.run(EngineKind::LinkBetweenItems, &store).unwrap();
    let track = rerun.scopes.iter().find(|s| s.scope == "track").unwrap();
    assert_eq!(track.outcome, ScopeOutcome::Skipped);
    assert_eq!(rerun.skipped(), 1);
    assert_eq!(rerun.edges(), 8);
}

#[test]
fn test_cross_type_runs_leave_other_pairs_alone() {
    let (store, _dir) = open_store();
    seed_titles(&store);
    Orchestrator::new(EngineSettings::default())
        .unwrap()
        .run(EngineKind::LinkBetweenItems, &store)
        .unwrap();

    let game_movie = TypePair::new(ContentType::Game, ContentType::Movie);
    let movie_game = TypePair::new(ContentType::Movie, ContentType::Game);
    let movie_serie = TypePair::new(ContentType::Movie, ContentType::Serie);
    let movie_game_before = store.content_links(movie_game).unwrap();
    let movie_serie_before = store.content_links(movie_serie).unwrap();
    assert_eq!(movie_serie_before.len(), 1);

    add_titled(&store, ContentType::Movie, 4, "Tetris");
    let engine = EngineKind::LinkBetweenItems.checkpoint_name();
    let last = store.last_run(engine, ContentType::Game).unwrap().unwrap();
    store
        .record_change_event(ContentType::Movie, &ItemId::Int(4), last + Duration::seconds(1))
        .unwrap();

    let mut only_game_movie = EngineSettings::default();
    only_game_movie.type_pairs = vec![game_movie];
    let report = Orchestrator::new(only_game_movie)
        .unwrap()
        .run(EngineKind::LinkBetweenItems, &store)
        .unwrap();

    assert_eq!(report.scopes.len(), 1);
    assert_eq!(report.edges(), 3);
    assert_eq!(store.count_content_links(game_movie).unwrap(), 3);
    assert_eq!(store.content_links(movie_game).unwrap(), movie_game_before);
    assert_eq!(store.content_links(movie_serie).unwrap(), movie_serie_before);
}

#[test]
fn test_new_pair_waits_for_anchor_staleness() {
    let (store, _dir) = open_store();
    seed_titles(&store);
    let game_movie = TypePair::new(ContentType::Game, ContentType::Movie);
    let game_serie = TypePair::new(ContentType::Game, ContentType::Serie);

    let mut first = EngineSettings::default();
    first.type_pairs = vec![game_movie];
    Orchestrator::new(first)
        .unwrap()
        .run(EngineKind::LinkBetweenItems, &store)
        .unwrap();

    // The game anchor is fresh, so the added pair is not computed yet.
    let mut widened = EngineSettings::default();
    widened.type_pairs = vec![game_movie, game_serie];
    let orchestrator = Orchestrator::new(widened).unwrap();
    let report = orchestrator.run(EngineKind::LinkBetweenItems, &store).unwrap();
    assert_eq!(report.skipped(), 1);
    assert_eq!(store.count_content_links(game_serie).unwrap(), 0);

    // Any change on the anchor or a partner type brings it in.
    let engine = EngineKind::LinkBetweenItems.checkpoint_name();
    let last = store.last_run(engine, ContentType::Game).unwrap().unwrap();
    store
        .record_change_event(ContentType::Serie, &ItemId::Int(1), last + Duration::seconds(1))
        .unwrap();
    let report = orchestrator.run(EngineKind::LinkBetweenItems, &store).unwrap();
    assert_eq!(report.skipped(), 0);
    assert_eq!(store.count_content_links(game_serie).unwrap(), 1);
    assert_eq!(store.count_content_links(game_movie).unwrap(), 2);
}
