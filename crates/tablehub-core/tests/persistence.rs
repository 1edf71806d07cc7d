//! Rebuilding views from their durable records

mod common;

use tablehub_core::{Hub, Operation, SheetError};

#[test]
fn test_record_round_trip() {
    let fx = common::fixture();
    let root = fx.root("votes");
    let ca = fx
        .hub
        .dispatch(
            &root,
            &Operation::Search {
                column: "state".to_string(),
                pattern: "^C".to_string(),
                columns_to_return: None,
            },
        )
        .unwrap();
    let freq = fx
        .hub
        .dispatch(
            &ca,
            &Operation::Frequency {
                columns: vec!["party".to_string()],
            },
        )
        .unwrap();

    let rebuilt = fx.hub.load_record(freq.id()).unwrap();
    assert_eq!(rebuilt.id(), freq.id());
    assert_eq!(rebuilt.sql(), freq.sql());
    assert_eq!(rebuilt.columns(), freq.columns());
    assert_eq!(rebuilt.parent_id(), freq.parent_id());
    assert_eq!(rebuilt.key_columns(), freq.key_columns());
    assert_eq!(rebuilt.desc(), Some("freq"));
    assert_eq!(
        fx.hub.rows(&rebuilt, 0, 10).unwrap(),
        fx.hub.rows(&freq, 0, 10).unwrap()
    );
}

#[test]
fn test_records_survive_restart() {
    let fx = common::fixture();
    let root = fx.root("votes");
    let freq = fx
        .hub
        .dispatch(
            &root,
            &Operation::Frequency {
                columns: vec!["state".to_string()],
            },
        )
        .unwrap();
    let freq_id = freq.id().to_string();
    let expected = fx.hub.rows(&freq, 0, 10).unwrap();

    let common::Fixture { dir, hub } = fx;
    drop(freq);
    drop(root);
    drop(hub);

    let reopened = Hub::open(common::config(dir.path())).unwrap();
    let loaded = reopened.load(&freq_id).unwrap();

    assert_eq!(loaded.id(), freq_id);
    assert_eq!(loaded.key_columns(), Some(&["state".to_string()][..]));
    assert_eq!(reopened.lineage(&loaded).unwrap().len(), 2);
    assert_eq!(reopened.rows(&loaded, 0, 10).unwrap(), expected);
}

#[test]
fn test_alias_and_id_resolve_identically() {
    let fx = common::fixture();
    let root = fx
        .hub
        .create_root(
            tablehub_core::RootSource::Table("votes".to_string()),
            tablehub_core::BackendKind::Disk,
            Some("all votes"),
        )
        .unwrap();

    let by_alias = fx.hub.load_record("all votes").unwrap();
    let by_id = fx.hub.load_record(root.id()).unwrap();

    assert_eq!(by_alias.id(), by_id.id());
    assert_eq!(by_alias.name(), Some("all votes"));
    assert_eq!(by_alias.columns(), by_id.columns());
}

#[test]
fn test_unknown_key_is_not_found() {
    let fx = common::fixture();

    let err = fx.hub.load("0123456789abcde").unwrap_err();
    assert!(matches!(err, SheetError::NotFound(_)), "{err}");
}

#[test]
fn test_failed_operation_stores_nothing() {
    let fx = common::fixture();
    let root = fx.root("votes");
    let bad = Operation::Filter {
        filters: vec![("nope".to_string(), Some("x".to_string()))],
        columns_to_return: None,
        mode: Default::default(),
    };
    assert!(fx.hub.dispatch(&root, &bad).is_err());

    let records = std::fs::read_dir(fx.records()).unwrap().count();
    assert_eq!(records, 1);
}

#[test]
fn test_unstorable_alias_stores_nothing() {
    let fx = common::fixture();
    let alias = "v".repeat(200);

    let err = fx
        .hub
        .create_root(
            tablehub_core::RootSource::Table("votes".to_string()),
            tablehub_core::BackendKind::Disk,
            Some(&alias),
        )
        .unwrap_err();
    assert!(matches!(err, SheetError::Store(_)), "{err}");
    assert_eq!(std::fs::read_dir(fx.records()).unwrap().count(), 0);

    // Without the alias the same view stores fine
    let root = fx.root("votes");
    assert_eq!(std::fs::read_dir(fx.records()).unwrap().count(), 1);
    assert!(fx.hub.load(root.id()).is_ok());
}
