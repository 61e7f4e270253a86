use std::fs;
use std::path::{Path, PathBuf};

use clap::{Arg, ArgMatches, Command};
use serde::Serialize;
use tmlrelease::{ContentKind, ReleaseError, TmlDocument, is_tml_file_name};
use walkdir::WalkDir;

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::CliError;
use crate::util;

/// One row of the details listing.
#[derive(Clone, Debug, Serialize)]
pub struct DocumentDetails {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ContentKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn command() -> Command {
    Command::new("details")
        .about("List kind, name and identifier of TML files stored under identifier-based filenames")
        .arg(
            Arg::new("path")
                .value_name("PATH")
                .help("A TML file or a directory searched recursively. Defaults to the current directory."),
        )
}

pub fn run(_session: &CliSession, matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let root = matches
        .get_one::<String>("path")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let files = if root.is_file() {
        vec![root.clone()]
    } else if root.is_dir() {
        collect_tml_files(&root)?
    } else {
        return Err(CliError::from(ReleaseError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", root.display()),
        ))));
    };

    let documents = files.iter().map(|path| describe(&root, path)).collect();
    Ok(CommandResult::Details { documents })
}

fn collect_tml_files(root: &Path) -> Result<Vec<PathBuf>, CliError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|err| CliError::from(std::io::Error::other(err.to_string())))?;
        if entry.file_type().is_file()
            && entry.file_name().to_str().is_some_and(is_tml_file_name)
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn describe(root: &Path, path: &Path) -> DocumentDetails {
    let file = path
        .strip_prefix(root)
        .ok()
        .filter(|rel| !rel.as_os_str().is_empty())
        .map(util::display_path)
        .unwrap_or_else(|| util::display_path(path));

    let parsed = fs::read_to_string(path)
        .map_err(ReleaseError::from)
        .and_then(|raw| TmlDocument::parse_draft(&raw));
    match parsed {
        Ok(document) => DocumentDetails {
            file,
            kind: Some(document.kind()),
            name: document.content_name().map(str::to_string),
            identifier: document.identifier().map(str::to_string),
            error: None,
        },
        Err(err) => {
            tracing::warn!(file = %path.display(), error = %err, "could not read TML file");
            DocumentDetails {
                file,
                kind: None,
                name: None,
                identifier: None,
                error: Some(err.to_string()),
            }
        }
    }
}
