use procflow::app::command_handlers::run_cli;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn run(config: &Path, args: &[&str]) -> Result<String, String> {
    let mut argv = vec!["--config".to_string(), config.display().to_string()];
    argv.extend(args.iter().map(|arg| arg.to_string()));
    run_cli(argv)
}

fn field<'a>(output: &'a str, key: &str) -> &'a str {
    output
        .lines()
        .find_map(|line| line.strip_prefix(key)?.strip_prefix('='))
        .unwrap_or_else(|| panic!("missing `{key}` in output:\n{output}"))
}

#[test]
fn command_handlers_module_setup_creates_config_and_catalog() {
    let temp = tempdir().expect("tempdir");
    let config = temp.path().join("procflow.yaml");

    let first = run(&config, &["setup"]).expect("setup");
    assert!(first.starts_with("setup complete"));
    assert_eq!(field(&first, "config_created"), "true");
    assert_eq!(
        field(&first, "database"),
        temp.path().join("procflow.db").display().to_string()
    );
    assert!(config.exists());

    let second = run(&config, &["setup"]).expect("setup again");
    assert_eq!(field(&second, "config_created"), "false");
}

#[test]
fn command_handlers_module_creates_shows_and_lists_processes() {
    let temp = tempdir().expect("tempdir");
    let config = temp.path().join("procflow.yaml");
    run(&config, &["setup"]).expect("setup");

    assert_eq!(run(&config, &["list"]).expect("empty list"), "no processes");

    let created = run(&config, &["create", "service_account_sync"]).expect("create");
    assert_eq!(field(&created, "process_type"), "SERVICE_ACCOUNT_SYNC");
    assert_eq!(field(&created, "steps"), "SYNCHRONIZE_SERVICE_ACCOUNTS");
    let process_id = field(&created, "process_id").to_string();

    let shown = run(&config, &["show", &process_id]).expect("show");
    assert_eq!(field(&shown, "process_id"), process_id);
    assert_eq!(field(&shown, "lease"), "none");
    assert_eq!(field(&shown, "state"), "pending");
    assert!(shown
        .lines()
        .any(|line| line.contains("SYNCHRONIZE_SERVICE_ACCOUNTS TODO")));

    let listed = run(&config, &["list"]).expect("list");
    assert_eq!(listed.lines().count(), 1);
    assert!(listed.starts_with(&process_id));
    assert!(listed.contains("leased=false"));
}

#[test]
fn command_handlers_module_declines_through_the_paired_step() {
    let temp = tempdir().expect("tempdir");
    let config = temp.path().join("procflow.yaml");
    run(&config, &["setup"]).expect("setup");

    let created = run(&config, &["create", "APPLICATION_CHECKLIST"]).expect("create");
    let process_id = field(&created, "process_id").to_string();

    let declined =
        run(&config, &["decline", &process_id, "VERIFY_REGISTRATION"]).expect("decline");
    assert_eq!(field(&declined, "decline_step"), "DECLINE_APPLICATION");
    assert_eq!(field(&declined, "appended"), "true");

    let shown = run(&config, &["show", &process_id]).expect("show");
    assert_eq!(field(&shown, "lease"), "none");
    assert!(shown
        .lines()
        .any(|line| line.contains("VERIFY_REGISTRATION SKIPPED")));
    assert!(shown
        .lines()
        .any(|line| line.contains("DECLINE_APPLICATION TODO")));

    let again = run(&config, &["decline", &process_id, "VERIFY_REGISTRATION"]).expect("again");
    assert_eq!(field(&again, "appended"), "false");
}

#[test]
fn command_handlers_module_writes_notifications_when_configured() {
    let temp = tempdir().expect("tempdir");
    let config = temp.path().join("procflow.yaml");
    run(&config, &["setup"]).expect("setup");
    let mut body = fs::read_to_string(&config).expect("read config");
    body.push_str("notifications_path: notifications.jsonl\n");
    fs::write(&config, body).expect("write config");

    let created = run(&config, &["create", "CERTIFICATE_APPROVAL"]).expect("create");
    let process_id = field(&created, "process_id").to_string();
    run(&config, &["decline", &process_id, "VERIFY_CERTIFICATE"]).expect("decline");

    let notifications =
        fs::read_to_string(temp.path().join("notifications.jsonl")).expect("read notifications");
    assert_eq!(notifications.lines().count(), 1);
    assert!(notifications.contains("\"notificationType\":\"step_declined\""));
    assert!(notifications.contains(&process_id));
}

#[test]
fn command_handlers_module_reports_operator_errors() {
    let temp = tempdir().expect("tempdir");
    let config = temp.path().join("procflow.yaml");

    let err = run(&config, &["list"]).expect_err("config missing");
    assert!(err.contains("failed to read file"));

    run(&config, &["setup"]).expect("setup");

    let created = run(&config, &["create", "SERVICE_ACCOUNT_SYNC"]).expect("create");
    let process_id = field(&created, "process_id").to_string();
    let err = run(
        &config,
        &["decline", &process_id, "SYNCHRONIZE_SERVICE_ACCOUNTS"],
    )
    .expect_err("no decline path");
    assert!(err.contains("has no decline counterpart"));

    let err = run(&config, &["create", "PAYROLL"]).expect_err("unknown type");
    assert!(err.contains("unknown process type `PAYROLL`"));

    let err = run(&config, &["show", "not-a-uuid"]).expect_err("bad id");
    assert!(err.contains("invalid process id"));

    let err = run(&config, &["frobnicate"]).expect_err("unknown command");
    assert_eq!(err, "unknown command `frobnicate`");
}

#[test]
fn command_handlers_module_prints_catalog_and_help() {
    let catalog = run_cli(vec!["catalog".to_string()]).expect("catalog");
    assert!(catalog.contains("SERVICE_ACCOUNT_SYNC"));
    assert!(catalog.contains(
        "START_CLEARING_HOUSE process_type=APPLICATION_CHECKLIST retrigger=RETRIGGER_CLEARING_HOUSE decline=DECLINE_APPLICATION"
    ));
    assert!(catalog.contains("  1 TODO"));

    let help = run_cli(Vec::new()).expect("help");
    assert!(help.starts_with("Usage: procflow"));
    assert_eq!(run_cli(vec!["--help".to_string()]).expect("help flag"), help);
    assert!(run_cli(vec!["--config".to_string()]).is_err());
}
