use std::ffi::OsString;
use std::process::ExitCode;

use clap::{Arg, ArgAction, ArgMatches, Command};
use tmlrelease::DEFAULT_CONFIG_FILE;

use crate::commands;
use crate::context::CliSession;
use crate::error::{CliError, ExitStatus};
use crate::formatter::{OutputFormat, emit_result};
use crate::util::Verbosity;

const NAME: &str = "tmlrelease";

pub fn run() -> ExitCode {
    init_tracing();
    match run_cli(std::env::args()) {
        Ok(code) => code,
        Err(err) => {
            err.print();
            err.exit_code()
        }
    }
}

/// Parses CLI arguments and dispatches to the matching command. Returns a `sysexits`
/// compatible `ExitCode` so release pipelines can branch on the failure class.
pub fn run_cli<I, S>(args: I) -> Result<ExitCode, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    let command = build_cli();
    let matches = command.try_get_matches_from(args)?;

    let verbosity = Verbosity {
        json: matches.get_flag("json"),
        verbose: matches.get_flag("verbose"),
    };
    let output = if verbosity.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let session = CliSession::bootstrap(matches.get_one::<String>("config").cloned(), verbosity);
    if session.verbosity.verbose {
        tracing::info!(config = %session.config_path.display(), "starting");
    }

    let result = dispatch(&session, &matches)?;
    emit_result(result, output)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_cli() -> Command {
    Command::new(NAME)
        .about("Promote exported TML between environments")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .help(format!(
                    "Release configuration file. Defaults to {DEFAULT_CONFIG_FILE} in the working directory."
                )),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Emit a single JSON line instead of human-readable text."),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Log the resolved configuration and paths before running."),
        )
        .subcommand_required(true)
        .subcommand(commands::release::command())
        .subcommand(commands::details::command())
        .subcommand(commands::map::command())
}

fn dispatch(
    session: &CliSession,
    matches: &ArgMatches,
) -> Result<commands::CommandResult, CliError> {
    match matches.subcommand() {
        Some(("release", sub)) => commands::release::run(session, sub),
        Some(("details", sub)) => commands::details::run(session, sub),
        Some(("map", sub)) => commands::map::run(session, sub),
        _ => Err(CliError::new("missing command", ExitStatus::Usage)),
    }
}
