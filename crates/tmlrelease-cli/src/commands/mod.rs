use serde::Serialize;
use tmlrelease::{BuildReport, ContentKind, GuidMap};

use crate::error::ExitStatus;

pub mod details;
pub mod map;
pub mod release;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandResult {
    ReleaseBuilt {
        environment: String,
        kind: ContentKind,
        release_name: String,
        release_dir: String,
        report: BuildReport,
    },
    Details {
        documents: Vec<details::DocumentDetails>,
    },
    MapListing {
        environment: String,
        path: String,
        entries: GuidMap,
    },
    MapEntry {
        environment: String,
        parent: String,
        child: Option<String>,
    },
    MapUpdated {
        environment: String,
        parent: String,
        child: String,
        previous: Option<String>,
    },
}

impl CommandResult {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            // Skipped documents were requested with --skip-checks and are not a failure.
            CommandResult::ReleaseBuilt { .. } => ExitStatus::Ok,
            CommandResult::Details { documents } => {
                if documents.iter().any(|doc| doc.error.is_some()) {
                    ExitStatus::Data
                } else {
                    ExitStatus::Ok
                }
            }
            CommandResult::MapEntry { child: None, .. } => ExitStatus::Data,
            _ => ExitStatus::Ok,
        }
    }
}
