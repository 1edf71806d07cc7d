//! Seeded database and hub shared by the integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use duckdb::Connection;
use tablehub_core::{BackendKind, Hub, HubConfig, Node, RootSource};
use tempfile::TempDir;

pub struct Fixture {
    pub dir: TempDir,
    pub hub: Hub,
}

impl Fixture {
    pub fn database(&self) -> PathBuf {
        self.dir.path().join("data.duckdb")
    }

    pub fn records(&self) -> PathBuf {
        self.dir.path().join("records")
    }

    pub fn root(&self, table: &str) -> std::sync::Arc<Node> {
        self.hub
            .create_root(RootSource::Table(table.to_string()), BackendKind::Disk, None)
            .unwrap()
    }
}

pub fn seed(path: &Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE votes (state VARCHAR, party VARCHAR, votes INTEGER);
         INSERT INTO votes VALUES
             ('CA', 'D', 10), ('CA', 'R', 5), ('NY', 'D', 7),
             ('TX', 'R', 9), ('TX', NULL, 1), ('NY', 'D', 3);
         CREATE TABLE wide (k VARCHAR, p INTEGER, v INTEGER);
         INSERT INTO wide SELECT 'a', i, i * 2 FROM range(36) t(i);
         CREATE TABLE narrow (k VARCHAR, p INTEGER, v INTEGER);
         INSERT INTO narrow SELECT 'a', i, i * 2 FROM range(35) t(i);
         CREATE TABLE gaps (k VARCHAR, p VARCHAR, v INTEGER);
         INSERT INTO gaps VALUES ('a', 'x', 1), ('a', NULL, 2), ('b', 'x', 3);
         CREATE TABLE big (k VARCHAR, p UBIGINT, v INTEGER);
         INSERT INTO big VALUES ('a', 1, 10), ('a', 18446744073709551615, 20);",
    )
    .unwrap();
}

pub fn config(dir: &Path) -> HubConfig {
    HubConfig {
        database: Some(dir.join("data.duckdb")),
        store_directory: Some(dir.join("records")),
        ..HubConfig::default()
    }
}

pub fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    seed(&dir.path().join("data.duckdb"));
    let hub = Hub::open(config(dir.path())).unwrap();
    Fixture { dir, hub }
}
