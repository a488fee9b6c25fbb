use crate::app::command_support::{
    emit_notifications, event_log, load_cli_settings, map_store_err, open_verified_store,
};
use crate::catalog::{ProcessTypeId, StepTypeId};
use crate::lease::LeaseManager;
use crate::orchestration::{OperatorActions, ProcessProgress, RetryDeclineController};
use crate::shared::{format_timestamp, Clock, ProcessId, SystemClock};
use crate::store::ProcessSnapshot;
use std::path::Path;

const DEFAULT_LIST_LIMIT: usize = 20;
const OPERATOR_HOLDER: &str = "operator";

fn parse_process_type(raw: &str) -> Result<ProcessTypeId, String> {
    ProcessTypeId::parse_label(raw).ok_or_else(|| {
        let known = ProcessTypeId::ALL
            .iter()
            .map(|process_type| process_type.label())
            .collect::<Vec<_>>()
            .join(", ");
        format!("unknown process type `{raw}` (expected one of: {known})")
    })
}

fn parse_step_type(raw: &str) -> Result<StepTypeId, String> {
    StepTypeId::parse_label(raw).ok_or_else(|| format!("unknown step type `{raw}`"))
}

pub fn cmd_create(config_path: &Path, args: &[String]) -> Result<String, String> {
    let [raw_type] = args else {
        return Err("usage: procflow create <process-type>".to_string());
    };
    let process_type = parse_process_type(raw_type)?;
    let settings = load_cli_settings(config_path)?;
    let store = open_verified_store(&settings)?;
    let snapshot = store
        .create_process_with_steps(
            process_type,
            process_type.initial_steps(),
            SystemClock.now(),
        )
        .map_err(map_store_err)?;
    Ok(format!(
        "created\nprocess_id={}\nprocess_type={}\nsteps={}",
        snapshot.process.id,
        snapshot.process.process_type,
        snapshot
            .steps
            .iter()
            .map(|step| step.step_type.label())
            .collect::<Vec<_>>()
            .join(",")
    ))
}

pub fn cmd_show(config_path: &Path, args: &[String]) -> Result<String, String> {
    let [raw_id] = args else {
        return Err("usage: procflow show <process-id>".to_string());
    };
    let process_id = ProcessId::parse(raw_id)?;
    let settings = load_cli_settings(config_path)?;
    let store = open_verified_store(&settings)?;
    let snapshot = store.read_process(process_id).map_err(map_store_err)?;
    Ok(render_snapshot(&snapshot, SystemClock.now()))
}

pub fn render_snapshot(snapshot: &ProcessSnapshot, now: i64) -> String {
    let process = &snapshot.process;
    let progress = ProcessProgress::from_steps(&snapshot.steps);
    let lease = match process.lock_expiry_date {
        None => "none".to_string(),
        Some(until) if process.is_leased(now) => format!("held until {}", format_timestamp(until)),
        Some(until) => format!("expired at {}", format_timestamp(until)),
    };
    let mut lines = vec![
        format!("process_id={}", process.id),
        format!("process_type={}", process.process_type),
        format!("version={}", process.version),
        format!("lease={lease}"),
        format!("created_at={}", format_timestamp(process.created_at)),
        format!("state={}", progress.summary()),
        format!(
            "steps todo={} done={} failed={} skipped={} duplicate={}",
            progress.todo, progress.done, progress.failed, progress.skipped, progress.duplicate
        ),
    ];
    for step in &snapshot.steps {
        let mut line = format!(
            "  {} {} {}",
            step.id,
            step.step_type.label(),
            step.status.label()
        );
        if let Some(retry_at) = step.retry_at {
            line.push_str(&format!(" retry_at={}", format_timestamp(retry_at)));
        }
        if let Some(message) = step.message.as_deref() {
            line.push_str(&format!(" message={message:?}"));
        }
        lines.push(line);
    }
    lines.join("\n")
}

pub fn cmd_list(config_path: &Path, args: &[String]) -> Result<String, String> {
    let limit = match args {
        [] => DEFAULT_LIST_LIMIT,
        [raw] => raw
            .parse::<usize>()
            .ok()
            .filter(|value| *value > 0)
            .ok_or_else(|| format!("invalid list limit `{raw}`"))?,
        _ => return Err("usage: procflow list [limit]".to_string()),
    };
    let settings = load_cli_settings(config_path)?;
    let store = open_verified_store(&settings)?;
    let processes = store.list_processes(limit).map_err(map_store_err)?;
    if processes.is_empty() {
        return Ok("no processes".to_string());
    }
    let now = SystemClock.now();
    Ok(processes
        .iter()
        .map(|process| {
            format!(
                "{} {} created_at={} leased={}",
                process.id,
                process.process_type,
                format_timestamp(process.created_at),
                process.is_leased(now)
            )
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

pub fn cmd_decline(config_path: &Path, args: &[String]) -> Result<String, String> {
    let [raw_id, raw_step_type] = args else {
        return Err("usage: procflow decline <process-id> <step-type>".to_string());
    };
    let process_id = ProcessId::parse(raw_id)?;
    let step_type = parse_step_type(raw_step_type)?;
    let settings = load_cli_settings(config_path)?;
    let store = open_verified_store(&settings)?;
    let log = event_log(&settings);
    let operator = OperatorActions::new(
        store.clone(),
        LeaseManager::new(store).with_log(log),
        RetryDeclineController::new(settings.retry),
        settings.worker.lease_seconds,
    );
    let decline = operator
        .request_decline(process_id, step_type, OPERATOR_HOLDER, SystemClock.now())
        .map_err(|err| err.to_string())?;
    emit_notifications(&settings, &decline.notifications);
    Ok(format!(
        "declined\nprocess_id={}\ndecline_step={}\nappended={}",
        decline.process_id, decline.decline_step, decline.appended
    ))
}
