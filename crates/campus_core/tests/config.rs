use campus_core::db::migrations::latest_version;
use campus_core::db::schema_version;
use campus_core::{load_config, ConfigError, CoreConfig};
use std::path::PathBuf;

#[test]
fn load_config_reads_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("school.db");
    let config_path = dir.path().join("campus.json");
    let json = serde_json::json!({
        "log_level": "warn",
        "db_path": db_path,
        "tenant_debug": true,
    });
    std::fs::write(&config_path, json.to_string()).unwrap();

    let config = load_config(Some(&config_path)).unwrap();
    assert_eq!(config.log_level, "warn");
    assert_eq!(config.db_path, Some(db_path.clone()));
    assert!(config.scope_policy().debug);

    let conn = config.open_database().unwrap();
    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    drop(conn);
    assert!(db_path.exists());
}

#[test]
fn load_config_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.json");
    let err = load_config(Some(&missing)).unwrap_err();
    assert!(matches!(err, ConfigError::Read { path, .. } if path == missing));
}

#[test]
fn load_config_rejects_malformed_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ \"log_level\": ").unwrap();
    assert!(matches!(
        load_config(Some(&path)),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn unset_db_path_opens_in_memory_database() {
    let config = CoreConfig {
        db_path: None,
        ..CoreConfig::default()
    };
    let conn = config.open_database().unwrap();
    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    assert!(!config.start_logging().unwrap());
}

#[test]
fn invalid_level_is_rejected() {
    let err = CoreConfig::from_json_str(r#"{ "log_level": "loud" }"#).unwrap_err();
    assert!(matches!(err, ConfigError::Logging(_)));
    assert!(CoreConfig::from_json_str(r#"{ "db_path": "/tmp/x.db" }"#)
        .unwrap()
        .db_path
        .is_some_and(|path| path == PathBuf::from("/tmp/x.db")));
}
