//! Durable engine behaviour against a throwaway database file

use duckdb::Connection;
use tablehub_duck::{BackendKind, Engine};

fn seed(path: &std::path::Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE votes (state VARCHAR, party VARCHAR, votes BIGINT);
         INSERT INTO votes VALUES ('CA', 'D', 10), ('TX', 'R', 7), ('NY', 'D', 5);
         CREATE TABLE empty_one (x INTEGER);",
    )
    .unwrap();
}

#[test]
fn test_disk_engine_is_read_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.duckdb");
    seed(&path);

    let engine = Engine::open_disk(&path).unwrap();
    assert_eq!(engine.kind(), BackendKind::Disk);

    let result = engine.query(r#"SELECT COUNT(*) FROM "votes""#, &[]).unwrap();
    assert_eq!(result.rows[0][0], serde_json::json!(3));

    assert!(engine.query("CREATE TABLE nope (x INTEGER)", &[]).is_err());
    assert!(engine.load_records("nope", &["x".to_string()], &[]).is_err());
}

#[test]
fn test_disk_engine_lists_tables() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.duckdb");
    seed(&path);

    let engine = Engine::open_disk(&path).unwrap();
    let tables = engine.tables().unwrap();

    let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["empty_one", "votes"]);
    assert_eq!(tables[1].column_count, 3);
    assert_eq!(tables[1].row_count, 3);
    assert_eq!(tables[0].row_count, 0);
}
