use crate::config::DEFAULT_CONFIG_FILE;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    Setup,
    Create,
    Show,
    List,
    Decline,
    Catalog,
    Help,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "setup" => CliVerb::Setup,
        "create" => CliVerb::Create,
        "show" => CliVerb::Show,
        "list" => CliVerb::List,
        "decline" => CliVerb::Decline,
        "catalog" => CliVerb::Catalog,
        "help" | "--help" | "-h" => CliVerb::Help,
        _ => CliVerb::Unknown,
    }
}

/// Arguments left after global options are stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliInvocation {
    pub config_path: PathBuf,
    pub args: Vec<String>,
}

pub fn split_global_options(args: Vec<String>) -> Result<CliInvocation, String> {
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_FILE);
    let mut rest = Vec::new();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let value = iter
                .next()
                .ok_or_else(|| "`--config` requires a path".to_string())?;
            config_path = PathBuf::from(value);
        } else if let Some(value) = arg.strip_prefix("--config=") {
            if value.is_empty() {
                return Err("`--config` requires a path".to_string());
            }
            config_path = PathBuf::from(value);
        } else {
            rest.push(arg);
        }
    }
    Ok(CliInvocation {
        config_path,
        args: rest,
    })
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Usage: procflow [--config <path>] <command>".to_string(),
        String::new(),
        "Commands:".to_string(),
        "  setup                                Create config, schema and catalog rows".to_string(),
        "  create <process-type>                Create a process with its initial step"
            .to_string(),
        "  show <process-id>                    Show a process and its steps".to_string(),
        "  list [limit]                         List the most recent processes".to_string(),
        "  decline <process-id> <step-type>     Close a branch with its decline step".to_string(),
        "  catalog                              Print process types and step types".to_string(),
    ]
}

pub(crate) fn help_text() -> String {
    cli_help_lines().join("\n")
}
