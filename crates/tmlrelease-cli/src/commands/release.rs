use std::str::FromStr;

use clap::{Arg, ArgAction, ArgMatches, Command};
use tmlrelease::{
    ContentKind, IdentityMap, NameIndex, ReleaseRequest, RunConfig, build_release,
};

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::{CliError, ExitStatus};
use crate::util;

pub fn command() -> Command {
    Command::new("release")
        .about("Build a release directory of TML rewritten for a destination environment")
        .arg(
            Arg::new("object-type")
                .long("object-type")
                .short('o')
                .required(true)
                .value_parser(["liveboard", "answer", "table", "worksheet", "view"])
                .help("Kind of object to release. Publish tables first, then views, worksheets, answers and liveboards."),
        )
        .arg(
            Arg::new("environment")
                .long("environment")
                .short('e')
                .required(true)
                .value_name("NAME")
                .help("Destination environment name, used as the key into the identity map."),
        )
        .arg(
            Arg::new("release-name")
                .long("release-name")
                .short('r')
                .required(true)
                .value_name("NAME")
                .help("Name of the release directory to write under the releases directory."),
        )
        .arg(
            Arg::new("skip-checks")
                .long("skip-checks")
                .action(ArgAction::SetTrue)
                .help("Skip documents whose table references cannot be resolved instead of failing."),
        )
}

pub fn run(session: &CliSession, matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let raw_kind = matches
        .get_one::<String>("object-type")
        .ok_or_else(|| CliError::new("--object-type is required", ExitStatus::Usage))?;
    let kind = ContentKind::from_str(raw_kind).map_err(|msg| CliError::new(msg, ExitStatus::Usage))?;
    let environment = matches
        .get_one::<String>("environment")
        .map(String::as_str)
        .unwrap_or_default();
    util::require_non_empty(environment, "--environment")?;
    let release_name = matches
        .get_one::<String>("release-name")
        .map(String::as_str)
        .unwrap_or_default();
    let skip_checks = matches.get_flag("skip-checks");

    let config = session.config()?;
    let run = RunConfig::from_config(config, environment, kind, release_name, skip_checks)?;
    if session.verbosity.verbose {
        tracing::info!(
            environment = %run.environment,
            kind = %run.kind,
            source = %run.source_dir.display(),
            release = %run.release_dir.display(),
            guid_map = %run.guid_map_path.display(),
            table_map_depth = run.table_properties.depth(),
            prefix = ?run.prefix,
            skip_checks = run.skip_checks,
            "resolved run configuration"
        );
    }

    let map = IdentityMap::load(&run.guid_map_path, &run.environment)?;
    let names = NameIndex::from_source_tree(&run.git_directory, run.kind)?;
    let report = build_release(&ReleaseRequest {
        source_dir: &run.source_dir,
        dest_dir: &run.release_dir,
        kind: run.kind,
        guids: map.environment(&run.environment),
        names: &names,
        table_properties: &run.table_properties,
        prefix: run.prefix.as_ref(),
        skip_checks: run.skip_checks,
    })?;

    Ok(CommandResult::ReleaseBuilt {
        environment: run.environment,
        kind: run.kind,
        release_name: run.release_name,
        release_dir: util::display_path(&run.release_dir),
        report,
    })
}
