use procflow::catalog::ProcessTypeId;
use procflow::config::{
    load_settings, save_settings, write_default_settings, ConfigError, Settings, WorkerSettings,
};
use procflow::orchestration::EngineSettings;
use std::fs;
use tempfile::tempdir;

#[test]
fn settings_module_resolves_paths_relative_to_the_config_file() {
    let temp = tempdir().expect("tempdir");
    let config_path = temp.path().join("conf/procflow.yaml");
    fs::create_dir_all(config_path.parent().expect("parent")).expect("create conf dir");
    fs::write(
        &config_path,
        r#"
database_path: data/procflow.db
log_path: /var/log/procflow.jsonl
worker:
  workers: 2
  lease_seconds: 45
retry:
  max_retriggers: 5
process_types:
  - service_account_sync
  - CERTIFICATE_APPROVAL
"#,
    )
    .expect("write config");

    let settings = load_settings(&config_path).expect("load settings");
    assert_eq!(
        settings.database_path,
        temp.path().join("conf/data/procflow.db")
    );
    assert_eq!(
        settings.log_path.as_deref(),
        Some(std::path::Path::new("/var/log/procflow.jsonl"))
    );
    assert_eq!(settings.worker.workers, 2);
    assert_eq!(settings.worker.lease_seconds, 45);
    assert_eq!(
        settings.worker.poll_interval_ms,
        WorkerSettings::default().poll_interval_ms
    );
    assert_eq!(settings.retry.max_retriggers, 5);

    let engine = EngineSettings::from_settings(&settings);
    assert_eq!(
        engine.process_types,
        vec![
            ProcessTypeId::ServiceAccountSync,
            ProcessTypeId::CertificateApproval
        ]
    );
    assert_eq!(engine.lease_seconds, 45);
    assert_eq!(engine.retry.max_retriggers, 5);
}

#[test]
fn settings_module_rejects_unknown_fields_and_process_types() {
    let temp = tempdir().expect("tempdir");
    let config_path = temp.path().join("procflow.yaml");

    fs::write(&config_path, "database_path: a.db\nworkers: 3\n").expect("write config");
    let err = load_settings(&config_path).expect_err("unknown field");
    assert!(matches!(err, ConfigError::Parse { .. }));

    fs::write(&config_path, "database_path: a.db\nprocess_types: [PAYROLL]\n")
        .expect("write config");
    let err = load_settings(&config_path).expect_err("unknown process type");
    assert!(err.to_string().contains("unknown process type `PAYROLL`"));
}

#[test]
fn settings_module_validates_worker_limits() {
    let temp = tempdir().expect("tempdir");
    let config_path = temp.path().join("procflow.yaml");
    fs::write(
        &config_path,
        "database_path: a.db\nworker:\n  batch_size: 0\n",
    )
    .expect("write config");

    let err = load_settings(&config_path).expect_err("zero batch size");
    match err {
        ConfigError::Settings(message) => assert!(message.contains("worker.batch_size")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn settings_module_validates_retry_backoff() {
    let temp = tempdir().expect("tempdir");
    let config_path = temp.path().join("procflow.yaml");
    fs::write(
        &config_path,
        "database_path: a.db\nretry:\n  backoff_base_secs: 60\n  backoff_max_secs: 10\n",
    )
    .expect("write config");

    let err = load_settings(&config_path).expect_err("cap below base");
    match err {
        ConfigError::Settings(message) => assert!(message.contains("retry.backoff_max_secs")),
        other => panic!("unexpected error: {other}"),
    }

    fs::write(
        &config_path,
        "database_path: a.db\nretry:\n  backoff_base_secs: 2\n",
    )
    .expect("write config");
    let settings = load_settings(&config_path).expect("load settings");
    assert_eq!(settings.retry.backoff_base_secs, 2);
    assert_eq!(settings.retry.retry_delay_secs(3), 8);
}

#[test]
fn settings_module_writes_defaults_once() {
    let temp = tempdir().expect("tempdir");
    let config_path = temp.path().join("nested/procflow.yaml");

    let settings = write_default_settings(&config_path).expect("write defaults");
    assert_eq!(
        settings.database_path,
        temp.path().join("nested/procflow.db")
    );
    assert_eq!(settings.worker, WorkerSettings::default());

    let err = write_default_settings(&config_path).expect_err("already exists");
    assert!(matches!(err, ConfigError::AlreadyExists { .. }));

    let mut updated = Settings::new("other.db");
    updated.worker.workers = 8;
    save_settings(&config_path, &updated).expect("save settings");
    let reloaded = load_settings(&config_path).expect("reload");
    assert_eq!(reloaded.worker.workers, 8);
    assert_eq!(reloaded.database_path, temp.path().join("nested/other.db"));
}
