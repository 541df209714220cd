//! Integration tests for the PostgreSQL tournament store.
//!
//! These need a running database and are ignored by default:
//! `DATABASE_URL=postgres://... cargo test -- --ignored`

use chrono::Utc;
use serial_test::serial;
use tourney::{
    lifecycle::controller,
    store::{Database, DatabaseConfig, PgTournamentStore, StoreError, TournamentStore},
    tournament::{Side, Tournament},
};
use uuid::Uuid;

/// Helper to connect to the test database and create the schema
async fn setup_store() -> (Database, PgTournamentStore) {
    let config = DatabaseConfig::from_env()
        .expect("Invalid database settings")
        .unwrap_or_else(DatabaseConfig::development);

    let db = Database::new(&config)
        .await
        .expect("Failed to create test database");
    let store = PgTournamentStore::new(&db);
    store.ensure_schema().await.expect("Failed to create schema");
    (db, store)
}

/// Helper to build a running tournament with a unique ID
fn running_tournament(n: usize) -> Tournament {
    let id = format!("t_test_{}", Uuid::new_v4().simple());
    let mut t = Tournament::new(id, "Store test".to_string(), 0);
    for i in 1..=n {
        controller::register(&mut t, format!("u{i}"), format!("User {i}"), Utc::now(), &mut Vec::new())
            .unwrap();
    }
    controller::close_registration(&mut t, Utc::now(), &mut Vec::new()).unwrap();
    t
}

/// Helper to cleanup a test tournament
async fn cleanup(db: &Database, id: &str) {
    let _ = sqlx::query("DELETE FROM engine_pointers WHERE tournament_id = $1")
        .bind(id)
        .execute(db.pool())
        .await;
    let _ = sqlx::query("DELETE FROM tournaments WHERE id = $1")
        .bind(id)
        .execute(db.pool())
        .await;
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_save_and_load_aggregate() {
    let (db, store) = setup_store().await;
    let mut t = running_tournament(5);
    controller::end_match(&mut t, "P1", Side::P2, Utc::now(), &mut Vec::new()).unwrap();

    store.save(&t).await.unwrap();
    let loaded = store.load(&t.id).await.unwrap();
    assert_eq!(loaded, t);
    assert!(store.list_ids().await.unwrap().contains(&t.id));

    cleanup(&db, &t.id).await;
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_save_replaces_aggregate() {
    let (db, store) = setup_store().await;
    let mut t = running_tournament(2);
    store.save(&t).await.unwrap();

    controller::end_match(&mut t, "R1M1", Side::P1, Utc::now(), &mut Vec::new()).unwrap();
    store.save(&t).await.unwrap();
    // Unchanged aggregate, nothing to write
    store.save(&t).await.unwrap();

    let loaded = store.load(&t.id).await.unwrap();
    assert_eq!(loaded.champion.as_deref(), Some("u1"));

    cleanup(&db, &t.id).await;
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_current_pointer() {
    let (db, store) = setup_store().await;
    let t = running_tournament(2);

    assert!(matches!(
        store.set_current(&t.id).await,
        Err(StoreError::NotFound(_))
    ));

    store.save(&t).await.unwrap();
    store.set_current(&t.id).await.unwrap();
    assert_eq!(store.current().await.unwrap(), Some(t.id.clone()));

    cleanup(&db, &t.id).await;
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_missing_tournament() {
    let (_db, store) = setup_store().await;

    assert!(matches!(
        store.load("t_does_not_exist").await,
        Err(StoreError::NotFound(id)) if id == "t_does_not_exist"
    ));
    store.health_check().await.unwrap();
}
