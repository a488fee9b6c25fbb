use crate::app::cli::{help_text, parse_cli_verb, split_global_options, CliVerb};

pub mod catalog;
pub mod processes;
pub mod setup;

pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    let invocation = split_global_options(args)?;
    let Some(verb) = invocation.args.first() else {
        return Ok(help_text());
    };
    let config = invocation.config_path.as_path();
    let rest = &invocation.args[1..];

    match parse_cli_verb(verb) {
        CliVerb::Setup => setup::cmd_setup(config),
        CliVerb::Create => processes::cmd_create(config, rest),
        CliVerb::Show => processes::cmd_show(config, rest),
        CliVerb::List => processes::cmd_list(config, rest),
        CliVerb::Decline => processes::cmd_decline(config, rest),
        CliVerb::Catalog => catalog::cmd_catalog(),
        CliVerb::Help => Ok(help_text()),
        CliVerb::Unknown => Err(format!("unknown command `{verb}`")),
    }
}
