use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::document::ContentKind;
use crate::error::ReleaseError;

/// Marker every exported content file carries in its name.
pub const TML_MARKER: &str = ".tml";

/// Canonical directories for a source tree and its releases.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReleasePaths {
    git_directory: PathBuf,
    releases_directory: PathBuf,
}

impl ReleasePaths {
    pub fn new(git_directory: impl Into<PathBuf>, releases_directory: impl Into<PathBuf>) -> Self {
        Self {
            git_directory: git_directory.into(),
            releases_directory: releases_directory.into(),
        }
    }

    /// Root of the exported source tree.
    pub fn git_directory(&self) -> &Path {
        &self.git_directory
    }

    /// Root under which every named release lives.
    pub fn releases_directory(&self) -> &Path {
        &self.releases_directory
    }

    /// Exported documents of one kind (`{git}/{kind}`).
    pub fn source_dir(&self, kind: ContentKind) -> PathBuf {
        self.git_directory.join(kind.as_str())
    }

    /// Output directory for one kind of a release (`{releases}/{release}/{kind}`).
    pub fn release_dir(&self, release: &str, kind: ContentKind) -> PathBuf {
        self.releases_directory.join(release).join(kind.as_str())
    }
}

/// `{parent_identifier}.{kind}.tml`
pub fn tml_file_name(identifier: &str, kind: ContentKind) -> String {
    format!("{identifier}.{}{TML_MARKER}", kind.as_str())
}

pub fn is_tml_file_name(name: &str) -> bool {
    name.contains(TML_MARKER)
}

/// Recovers the parent identifier embedded in an exported filename.
pub fn parent_identifier_from_filename(name: &str) -> Option<&str> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^([^.]+)\.(?:table|view|worksheet|answer|liveboard|pinboard)\.tml$")
            .expect("Invalid regex")
    });
    pattern
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Regular files in `dir` whose names carry the TML marker, in filename order.
pub fn list_tml_files(dir: &Path) -> Result<Vec<PathBuf>, ReleaseError> {
    let entries = fs::read_dir(dir)
        .map_err(|err| ReleaseError::Io(err).context(format!("reading {}", dir.display())))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if entry.file_name().to_str().is_some_and(is_tml_file_name) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Directory name used to group tables that share a connection. Spaces and path
/// separators become `_`; names that would leave the release directory are rejected.
pub fn connection_dir_name(connection: &str) -> Result<String, ReleaseError> {
    let name = connection.replace([' ', '/', '\\'], "_");
    if name.is_empty() || name == "." || name == ".." {
        return Err(ReleaseError::format(format!(
            "connection name '{connection}' cannot be used as a directory name"
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn release_paths_follow_kind_layout() {
        let paths = ReleasePaths::new("/repo/tml", "/repo/releases");
        assert_eq!(
            paths.source_dir(ContentKind::Worksheet),
            PathBuf::from("/repo/tml/worksheet")
        );
        assert_eq!(
            paths.release_dir("r1", ContentKind::Table),
            PathBuf::from("/repo/releases/r1/table")
        );
        assert_eq!(paths.releases_directory(), Path::new("/repo/releases"));
    }

    #[test]
    fn parent_identifier_is_read_from_filename() {
        let name = tml_file_name("0f1e-22", ContentKind::Answer);
        assert_eq!(name, "0f1e-22.answer.tml");
        assert_eq!(parent_identifier_from_filename(&name), Some("0f1e-22"));
        assert_eq!(parent_identifier_from_filename("notes.txt"), None);
        assert_eq!(parent_identifier_from_filename("abc.table.tml.bak"), None);
    }

    #[test]
    fn list_tml_files_skips_directories_and_other_files() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("b.table.tml"), "x").unwrap();
        fs::write(temp.path().join("a.table.tml"), "x").unwrap();
        fs::write(temp.path().join("README.md"), "x").unwrap();
        fs::create_dir_all(temp.path().join("nested.tml")).unwrap();

        let files = list_tml_files(temp.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.table.tml", "b.table.tml"]);
    }

    #[test]
    fn missing_directory_is_io_error() {
        let temp = tempdir().unwrap();
        let err = list_tml_files(&temp.path().join("absent")).unwrap_err();
        assert!(matches!(err, ReleaseError::Io(_)));
    }

    #[test]
    fn connection_names_replace_spaces_and_separators() {
        assert_eq!(connection_dir_name("Prod DB").unwrap(), "Prod_DB");
        assert_eq!(connection_dir_name("a/b\\c").unwrap(), "a_b_c");
        assert_eq!(connection_dir_name("../x").unwrap(), ".._x");
    }

    #[test]
    fn connection_names_that_escape_are_rejected() {
        for name in ["", ".", ".."] {
            let err = connection_dir_name(name).unwrap_err();
            assert!(matches!(err, ReleaseError::Format { .. }), "{name}");
        }
    }
}
