use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::document::{ContentKind, TmlDocument};
use crate::error::ReleaseError;
use crate::identity_map::GuidMap;
use crate::name_index::NameIndex;
use crate::rewrite::{IdentityAction, ReferenceRewriter};
use crate::table_properties::TablePropertyMap;
use crate::workspace::{connection_dir_name, list_tml_files};

/// Environment prefix swap for object names, e.g. `dev_` → `prod_`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PrefixRule {
    pub previous: String,
    pub new: String,
}

impl PrefixRule {
    pub fn new(previous: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            previous: previous.into(),
            new: new.into(),
        }
    }

    /// Replaces only the first occurrence, and only when the name starts with the prefix.
    pub fn apply(&self, name: &str) -> Option<String> {
        if self.previous.is_empty() || !name.starts_with(&self.previous) {
            return None;
        }
        Some(name.replacen(&self.previous, &self.new, 1))
    }
}

/// Everything one release build needs, borrowed from the caller's run configuration.
pub struct ReleaseRequest<'a> {
    pub source_dir: &'a Path,
    pub dest_dir: &'a Path,
    pub kind: ContentKind,
    pub guids: &'a GuidMap,
    pub names: &'a NameIndex,
    pub table_properties: &'a TablePropertyMap,
    pub prefix: Option<&'a PrefixRule>,
    /// Downgrade unresolved references from fatal to skip-with-warning.
    pub skip_checks: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct WrittenDocument {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub name: Option<String>,
    #[serde(flatten)]
    pub action: IdentityAction,
}

#[derive(Clone, Debug, Serialize)]
pub struct SkippedDocument {
    pub source: PathBuf,
    pub reason: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct BuildReport {
    pub written: Vec<WrittenDocument>,
    pub skipped: Vec<SkippedDocument>,
}

impl BuildReport {
    pub fn created(&self) -> usize {
        self.written
            .iter()
            .filter(|doc| doc.action == IdentityAction::Create)
            .count()
    }

    pub fn updated(&self) -> usize {
        self.written.len() - self.created()
    }
}

/// Copies every TML file of one kind into the release directory, rewritten for the
/// destination environment.
///
/// Existing files at the destination are overwritten. On failure, files written for
/// earlier documents in the batch stay on disk.
pub fn build_release(request: &ReleaseRequest<'_>) -> Result<BuildReport, ReleaseError> {
    let files = list_tml_files(request.source_dir)?;
    fs::create_dir_all(request.dest_dir)?;

    let rewriter = ReferenceRewriter::new(request.guids, request.names);
    let mut report = BuildReport::default();

    for source in files {
        let Some(file_name) = source.file_name().map(|name| name.to_os_string()) else {
            continue;
        };
        let raw = fs::read_to_string(&source)?;
        let mut document = TmlDocument::parse(&raw).map_err(|err| err.at_path(&source))?;
        if document.kind() != request.kind {
            return Err(ReleaseError::Format {
                path: Some(source.clone()),
                message: format!(
                    "expected {} content, found {}",
                    request.kind,
                    document.kind()
                ),
            });
        }

        if let Some(table) = document.as_table_mut() {
            request.table_properties.apply(table);
        }

        let action = match rewriter.rewrite(&mut document) {
            Ok(action) => action,
            Err(err @ ReleaseError::UnresolvedReference { .. }) if request.skip_checks => {
                tracing::warn!(file = %source.display(), error = %err, "skipping document");
                report.skipped.push(SkippedDocument {
                    source,
                    reason: err.to_string(),
                });
                continue;
            }
            Err(ReleaseError::UnresolvedReference { references, .. }) => {
                return Err(ReleaseError::UnresolvedReference {
                    document: file_name.to_string_lossy().into_owned(),
                    references,
                });
            }
            Err(err) => return Err(err.at_path(&source)),
        };

        if let Some(rule) = request.prefix {
            if let Some(renamed) = document.content_name().and_then(|name| rule.apply(name)) {
                document.set_content_name(renamed);
            }
        }

        let target_dir = match document.as_table().and_then(|t| t.connection_name()) {
            Some(connection) => {
                let dir = request
                    .dest_dir
                    .join(connection_dir_name(connection).map_err(|err| err.at_path(&source))?);
                fs::create_dir_all(&dir)?;
                dir
            }
            None => request.dest_dir.to_path_buf(),
        };
        let destination = target_dir.join(&file_name);

        fs::write(&destination, document.to_yaml_string()?)?;
        tracing::info!(
            source = %source.display(),
            destination = %destination.display(),
            ?action,
            "wrote release file"
        );

        report.written.push(WrittenDocument {
            source,
            destination,
            name: document.content_name().map(str::to_string),
            action,
        });
    }

    Ok(report)
}
