use clap::{Arg, ArgMatches, Command};
use tmlrelease::IdentityMap;

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::{CliError, ExitStatus};
use crate::util;

fn environment_arg() -> Arg {
    Arg::new("environment")
        .long("environment")
        .short('e')
        .required(true)
        .value_name("NAME")
        .help("Environment whose identifier pairs to use.")
}

pub fn command() -> Command {
    Command::new("map")
        .about("Inspect or repair the parent to child identifier map")
        .subcommand_required(true)
        .subcommand(
            Command::new("show")
                .about("List every identifier pair recorded for an environment")
                .arg(environment_arg()),
        )
        .subcommand(
            Command::new("get")
                .about("Look up the child identifier of one parent")
                .arg(environment_arg())
                .arg(Arg::new("parent").required(true).value_name("PARENT")),
        )
        .subcommand(
            Command::new("set")
                .about("Record or replace the child identifier of one parent")
                .arg(environment_arg())
                .arg(Arg::new("parent").required(true).value_name("PARENT"))
                .arg(Arg::new("child").required(true).value_name("CHILD")),
        )
}

pub fn run(session: &CliSession, matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let path = session.config()?.guid_map_path();
    match matches.subcommand() {
        Some(("show", sub)) => {
            let environment = required(sub, "environment")?;
            let map = IdentityMap::load(&path, environment)?;
            Ok(CommandResult::MapListing {
                environment: environment.to_string(),
                path: util::display_path(&path),
                entries: map.environment(environment).clone(),
            })
        }
        Some(("get", sub)) => {
            let environment = required(sub, "environment")?;
            let parent = required(sub, "parent")?;
            let map = IdentityMap::load(&path, environment)?;
            Ok(CommandResult::MapEntry {
                environment: environment.to_string(),
                parent: parent.to_string(),
                child: map.get(environment, parent).map(str::to_string),
            })
        }
        Some(("set", sub)) => {
            let environment = required(sub, "environment")?;
            let parent = required(sub, "parent")?;
            let child = required(sub, "child")?;
            let mut map = IdentityMap::load(&path, environment)?;
            let previous = map.put(environment, parent, child);
            map.save(&path)?;
            tracing::info!(environment, parent, child, ?previous, "updated identity map");
            Ok(CommandResult::MapUpdated {
                environment: environment.to_string(),
                parent: parent.to_string(),
                child: child.to_string(),
                previous,
            })
        }
        _ => Err(CliError::new("missing map subcommand", ExitStatus::Usage)),
    }
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str, CliError> {
    let value = matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| CliError::new(format!("missing {name}"), ExitStatus::Usage))?;
    util::require_non_empty(value, name)?;
    Ok(value)
}
