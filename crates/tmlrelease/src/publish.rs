use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::error::ReleaseError;
use crate::identity_map::IdentityMap;
use crate::workspace::{connection_dir_name, list_tml_files, parent_identifier_from_filename};

/// Import error the platform raises when another table already points at the same
/// database table on the connection. Reported but not fatal.
pub const DUPLICATE_TABLE_ERROR: i64 = 14501;

/// Result of importing one document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportOutcome {
    Created { identifier: String },
    Failed { code: Option<i64>, message: String },
}

/// Sends a batch of TML documents to the destination environment.
pub trait TmlPublisher {
    /// Imports `documents` as one package and returns one outcome per document, in order.
    fn import(&self, documents: &[String]) -> Result<Vec<ImportOutcome>, ReleaseError>;
}

/// Decodes the import endpoint's response body:
/// `{"object": [{"response": {"status": {...}, "header": {"id_guid": ...}}}]}`.
pub fn outcomes_from_import_response(body: &Value) -> Result<Vec<ImportOutcome>, ReleaseError> {
    let entries = body
        .get("object")
        .and_then(Value::as_array)
        .ok_or_else(|| ReleaseError::Publish("import response has no object list".into()))?;

    entries
        .iter()
        .map(|entry| {
            let response = entry.get("response");
            let status = response.and_then(|r| r.get("status"));
            let status_code = status
                .and_then(|s| s.get("status_code"))
                .and_then(Value::as_str)
                .unwrap_or("ERROR");
            if status_code == "OK" {
                let identifier = response
                    .and_then(|r| r.get("header"))
                    .and_then(|header| header.get("id_guid"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ReleaseError::Publish("successful import entry has no id_guid".into())
                    })?;
                Ok(ImportOutcome::Created {
                    identifier: identifier.to_string(),
                })
            } else {
                Ok(ImportOutcome::Failed {
                    code: status.and_then(|s| s.get("error_code")).and_then(Value::as_i64),
                    message: status
                        .and_then(|s| s.get("error_message"))
                        .and_then(Value::as_str)
                        .unwrap_or(status_code)
                        .to_string(),
                })
            }
        })
        .collect()
}

#[derive(Clone, Debug, Serialize)]
pub struct PublishedDocument {
    pub file: PathBuf,
    pub parent: String,
    pub child: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct RejectedDocument {
    pub file: PathBuf,
    pub code: Option<i64>,
    pub message: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PublishReport {
    pub published: Vec<PublishedDocument>,
    pub rejected: Vec<RejectedDocument>,
}

/// Imports a built release and records every new parent→child pair in `map`.
///
/// The top-level directory and each connection subdirectory are imported as separate
/// packages. With `connection`, only that connection's subdirectory is imported.
/// The caller saves `map` afterwards.
pub fn publish_release(
    release_dir: &Path,
    connection: Option<&str>,
    publisher: &dyn TmlPublisher,
    map: &mut IdentityMap,
    environment: &str,
) -> Result<PublishReport, ReleaseError> {
    let directories = match connection {
        Some(name) => vec![release_dir.join(connection_dir_name(name)?)],
        None => package_directories(release_dir)?,
    };

    let mut report = PublishReport::default();
    for dir in directories {
        let files = list_tml_files(&dir)?;
        if files.is_empty() {
            continue;
        }

        let mut parents = Vec::with_capacity(files.len());
        let mut documents = Vec::with_capacity(files.len());
        for file in &files {
            let name = file
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default();
            let parent = parent_identifier_from_filename(name).ok_or_else(|| {
                ReleaseError::Publish(format!(
                    "{} does not follow the {{guid}}.{{type}}.tml naming pattern",
                    file.display()
                ))
            })?;
            parents.push(parent.to_string());
            documents.push(fs::read_to_string(file)?);
        }

        tracing::info!(directory = %dir.display(), count = documents.len(), "importing package");
        let outcomes = publisher.import(&documents)?;
        if outcomes.len() != files.len() {
            return Err(ReleaseError::Publish(format!(
                "publisher returned {} results for {} documents in {}",
                outcomes.len(),
                files.len(),
                dir.display()
            )));
        }

        for ((file, parent), outcome) in files.into_iter().zip(parents).zip(outcomes) {
            match outcome {
                ImportOutcome::Created { identifier } => {
                    map.put(environment, parent.as_str(), identifier.as_str());
                    report.published.push(PublishedDocument {
                        file,
                        parent,
                        child: identifier,
                    });
                }
                ImportOutcome::Failed { code, message }
                    if code == Some(DUPLICATE_TABLE_ERROR) =>
                {
                    tracing::warn!(
                        file = %file.display(),
                        %message,
                        "another table on this connection already uses the same database table"
                    );
                    report.rejected.push(RejectedDocument {
                        file,
                        code,
                        message,
                    });
                }
                ImportOutcome::Failed { code, message } => {
                    return Err(ReleaseError::Publish(format!(
                        "import of {} failed{}: {message}",
                        file.display(),
                        code.map(|c| format!(" with code {c}")).unwrap_or_default()
                    )));
                }
            }
        }
    }

    Ok(report)
}

fn package_directories(release_dir: &Path) -> Result<Vec<PathBuf>, ReleaseError> {
    let mut directories = vec![release_dir.to_path_buf()];
    let mut nested = Vec::new();
    for entry in fs::read_dir(release_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            nested.push(entry.path());
        }
    }
    nested.sort();
    directories.extend(nested);
    Ok(directories)
}
