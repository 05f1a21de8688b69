use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use tablebook::console::run_line;
use tablebook::engine::Engine;
use tablebook::store::WalStore;

fn test_journal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("tablebook_test_flow");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn open(path: &PathBuf) -> Engine {
    Engine::new(Arc::new(WalStore::open(path).unwrap()), 1)
}

async fn one(engine: &Engine, line: &str) -> Value {
    let out = run_line(engine, line).await;
    serde_json::from_str(&out).unwrap_or_else(|e| panic!("{line} -> {out:?}: {e}"))
}

async fn many(engine: &Engine, line: &str) -> Vec<Value> {
    run_line(engine, line)
        .await
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

async fn seed(engine: &Engine) {
    for line in [
        "INSERT INTO restaurants (id, name, address) VALUES (1, 'La Mesa', 'Calle Larga 12')",
        "INSERT INTO tables (id, number, capacity) VALUES (1, 1, 4)",
        "INSERT INTO tables (id, number, capacity) VALUES (2, 2, 6)",
        "INSERT INTO clients VALUES (1, 'Ana', 'Ruiz', '0102030405', '555-0101')",
        "INSERT INTO employees VALUES (1, 'Luis Vega')",
    ] {
        assert_eq!(one(engine, line).await["ok"], true, "{line}");
    }
}

fn status_of(rows: &[Value], table: i64) -> String {
    rows.iter()
        .find(|r| r["id"] == table)
        .map(|r| r["status"].as_str().unwrap().to_string())
        .unwrap()
}

#[tokio::test]
async fn book_check_and_complete() {
    let engine = open(&test_journal_path("book_check_complete.journal"));
    seed(&engine).await;

    let created = one(
        &engine,
        "INSERT INTO reservations (client_id, party_size, at, tables) VALUES (1, 3, '2099-06-01 19:00', '1')",
    )
    .await;
    assert_eq!(created["ok"], true);
    let r1 = created["reservation_id"].as_i64().unwrap();

    let rows = many(&engine, "SELECT * FROM availability WHERE at = '2099-06-01 20:30'").await;
    assert_eq!(status_of(&rows, 1), "Reserved");
    assert_eq!(status_of(&rows, 2), "Available");

    let rows = many(&engine, "SELECT * FROM availability WHERE at = '2099-06-01 23:00'").await;
    assert_eq!(status_of(&rows, 1), "Available");

    let too_big = one(
        &engine,
        "INSERT INTO reservations VALUES (1, 5, '2099-06-01 20:00', '1')",
    )
    .await;
    assert_eq!(too_big["kind"], "capacity");
    assert_eq!(too_big["shortfall"], 1);

    let clash = one(
        &engine,
        "INSERT INTO reservations VALUES (1, 2, '2099-06-01 20:00', '1,2')",
    )
    .await;
    assert_eq!(clash["kind"], "conflict");
    assert_eq!(clash["tables"], serde_json::json!([1]));

    let conflicts = one(
        &engine,
        "SELECT * FROM conflicts WHERE at = '2099-06-01 20:00' AND tables = '1,2'",
    )
    .await;
    assert_eq!(conflicts["conflicts"], serde_json::json!([1]));
    let own = one(
        &engine,
        &format!("SELECT * FROM conflicts WHERE at = '2099-06-01 20:00' AND tables = '1' AND ignore = {r1}"),
    )
    .await;
    assert_eq!(own["conflicts"], serde_json::json!([]));

    let done = one(
        &engine,
        &format!("UPDATE reservations SET state = 'completed' WHERE id = {r1}"),
    )
    .await;
    assert_eq!(done["state"], "Completed");
    assert_eq!(done["policy_id"], 3);

    let rows = many(&engine, "SELECT * FROM availability WHERE at = '2099-06-01 19:30'").await;
    assert_eq!(status_of(&rows, 1), "Occupied");
}

#[tokio::test]
async fn edit_cancel_and_delete() {
    let engine = open(&test_journal_path("edit_cancel_delete.journal"));
    seed(&engine).await;

    one(&engine, "INSERT INTO tables VALUES (3, 3, 8)").await;
    let r1 = one(&engine, "INSERT INTO reservations VALUES (1, 12, '2099-07-01 20:00', '1,3', 1)").await
        ["reservation_id"]
        .as_i64()
        .unwrap();

    let detail = one(&engine, &format!("SELECT * FROM reservations WHERE id = {r1}")).await;
    assert_eq!(detail["policy"], "Large event");
    assert_eq!(detail["policy_value_cents"], 5000);
    assert_eq!(detail["employee"], "Luis Vega");
    assert_eq!(detail["tables"], "1, 3");
    assert_eq!(detail["at"], "2099-07-01 20:00");

    let edited = one(
        &engine,
        &format!(
            "UPDATE reservations SET client_id = 1, party_size = 2, at = '2099-07-01 21:00', tables = '2' WHERE id = {r1}"
        ),
    )
    .await;
    assert_eq!(edited["ok"], true);

    let detail = one(&engine, &format!("SELECT * FROM reservations WHERE id = {r1}")).await;
    assert_eq!(detail["policy"], "Standard");
    assert_eq!(detail["employee"], "unassigned");
    assert_eq!(detail["tables"], "2");
    assert_eq!(detail["state"], "Pending");

    let cancelled = one(
        &engine,
        &format!("UPDATE reservations SET state = 'cancelled' WHERE id = {r1}"),
    )
    .await;
    assert_eq!(cancelled["policy_id"], 1);

    let rows = many(&engine, "SELECT * FROM availability WHERE at = '2099-07-01 21:00'").await;
    assert_eq!(status_of(&rows, 2), "Available");

    assert_eq!(
        one(&engine, &format!("DELETE FROM reservations WHERE id = {r1}")).await["ok"],
        true
    );
    assert!(many(&engine, "SELECT * FROM reservations").await.is_empty());
    let missing = one(&engine, &format!("SELECT * FROM reservations WHERE id = {r1}")).await;
    assert_eq!(missing["kind"], "not_found");
}

#[tokio::test]
async fn validation_failures_are_reported() {
    let engine = open(&test_journal_path("validation_failures.journal"));
    seed(&engine).await;

    for line in [
        "INSERT INTO reservations VALUES (NULL, 2, '2099-06-01 19:00', '1')",
        "INSERT INTO reservations VALUES (1, 2, '2099-06-01 19:00', '')",
        "INSERT INTO reservations VALUES (1, 0, '2099-06-01 19:00', '1')",
        "INSERT INTO reservations VALUES (1, 2, 'someday', '1')",
        "INSERT INTO reservations VALUES (1, 2, '2001-01-01 19:00', '1')",
        "INSERT INTO reservations VALUES (1, 2, '2099-06-01 19:00', '9')",
    ] {
        let out = one(&engine, line).await;
        assert_eq!(out["ok"], false, "{line}");
        assert_eq!(out["kind"], "validation", "{line}");
    }
    assert!(many(&engine, "SELECT * FROM reservations").await.is_empty());
}

#[tokio::test]
async fn monitor_survives_restart() {
    let path = test_journal_path("monitor_restart.journal");
    {
        let engine = open(&path);
        seed(&engine).await;
        one(&engine, "INSERT INTO reservations VALUES (1, 2, '2099-06-01 19:00', '1')").await;
        one(&engine, "INSERT INTO reservations VALUES (1, 4, '2099-06-02 19:00', '2')").await;
    }

    let engine = open(&path);
    let rows = many(&engine, "SELECT * FROM reservations").await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["at"], "2099-06-02 19:00");
    assert_eq!(rows[0]["client"], "Ana Ruiz");
    assert_eq!(rows[1]["tables"], "1");

    // Ids are not reused after a restart.
    let next = one(&engine, "INSERT INTO reservations VALUES (1, 2, '2099-06-03 19:00', '1')").await;
    assert_eq!(next["reservation_id"], 3);
}
