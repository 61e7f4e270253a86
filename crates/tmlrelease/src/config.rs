use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::document::ContentKind;
use crate::error::ReleaseError;
use crate::release::PrefixRule;
use crate::table_properties::TablePropertyMap;
use crate::workspace::ReleasePaths;

/// Default config file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "thoughtspot_release_config.toml";

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct PrefixChanges {
    pub previous_env_prefix: Option<String>,
    pub new_env_prefix: Option<String>,
}

impl PrefixChanges {
    /// A rule only exists when both prefixes are set and differ.
    pub fn rule(&self) -> Option<PrefixRule> {
        match (&self.previous_env_prefix, &self.new_env_prefix) {
            (Some(previous), Some(new)) if previous != new => {
                Some(PrefixRule::new(previous.clone(), new.clone()))
            }
            _ => None,
        }
    }
}

/// Settings an environment-specific file may override.
#[derive(Clone, Debug, Default, Deserialize)]
struct EnvironmentOverrides {
    #[serde(default)]
    table_properties_map: BTreeMap<String, String>,
    object_prefix_changes: Option<PrefixChanges>,
}

/// Parsed release configuration file.
#[derive(Clone, Debug, Deserialize)]
pub struct ReleaseConfig {
    pub git_directory: PathBuf,
    pub releases_directory: PathBuf,
    pub parent_child_guid_map_file: PathBuf,
    #[serde(default)]
    pub table_properties_map: BTreeMap<String, String>,
    pub object_prefix_changes: Option<PrefixChanges>,
    #[serde(default)]
    pub environment_config_files: BTreeMap<String, PathBuf>,
    /// Directory relative paths are resolved against.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl ReleaseConfig {
    pub fn parse(raw: &str, base_dir: impl Into<PathBuf>) -> Result<Self, ReleaseError> {
        let mut config: ReleaseConfig = toml::from_str(raw)?;
        config.base_dir = base_dir.into();
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ReleaseError> {
        let raw = fs::read_to_string(path)
            .map_err(|err| ReleaseError::Io(err).context(format!("reading {}", path.display())))?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::parse(&raw, base).map_err(|err| err.context(path.display()))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn paths(&self) -> ReleasePaths {
        ReleasePaths::new(
            self.resolve(&self.git_directory),
            self.resolve(&self.releases_directory),
        )
    }

    pub fn guid_map_path(&self) -> PathBuf {
        self.resolve(&self.parent_child_guid_map_file)
    }

    /// Table mapping and prefix rule for `environment`, taken from its own config file
    /// when one is listed and from the main file otherwise.
    fn overrides_for(&self, environment: &str) -> Result<EnvironmentOverrides, ReleaseError> {
        let Some(listed) = self.environment_config_files.get(environment) else {
            return Ok(EnvironmentOverrides {
                table_properties_map: self.table_properties_map.clone(),
                object_prefix_changes: self.object_prefix_changes.clone(),
            });
        };

        let direct = self.resolve(listed);
        let path = if direct.is_file() {
            direct
        } else {
            let mut fallback = direct.into_os_string();
            fallback.push("_config.toml");
            PathBuf::from(fallback)
        };
        if !path.is_file() {
            return Err(ReleaseError::ConfigValidation(format!(
                "cannot find configuration for environment '{environment}' at {} or {}_config.toml",
                listed.display(),
                listed.display()
            )));
        }
        let raw = fs::read_to_string(&path)?;
        tracing::debug!(environment, path = %path.display(), "loaded environment config");
        toml::from_str(&raw).map_err(|err| ReleaseError::from(err).context(path.display()))
    }
}

/// Immutable settings for one release build, constructed once per invocation.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub environment: String,
    pub kind: ContentKind,
    pub release_name: String,
    pub source_dir: PathBuf,
    pub release_dir: PathBuf,
    pub git_directory: PathBuf,
    pub guid_map_path: PathBuf,
    pub table_properties: TablePropertyMap,
    pub prefix: Option<PrefixRule>,
    pub skip_checks: bool,
}

impl RunConfig {
    /// Validates the table property map here, before any document is read.
    pub fn from_config(
        config: &ReleaseConfig,
        environment: &str,
        kind: ContentKind,
        release_name: &str,
        skip_checks: bool,
    ) -> Result<Self, ReleaseError> {
        if release_name.trim().is_empty() {
            return Err(ReleaseError::ConfigValidation(
                "release name must not be empty".into(),
            ));
        }
        if release_name.contains('/') || release_name.contains('\\') {
            return Err(ReleaseError::ConfigValidation(
                "release name must not contain path separators".into(),
            ));
        }

        let overrides = config.overrides_for(environment)?;
        let table_properties = TablePropertyMap::new(overrides.table_properties_map)?;
        let prefix = overrides
            .object_prefix_changes
            .as_ref()
            .and_then(PrefixChanges::rule);
        let paths = config.paths();

        Ok(Self {
            environment: environment.to_string(),
            kind,
            release_name: release_name.to_string(),
            source_dir: paths.source_dir(kind),
            release_dir: paths.release_dir(release_name, kind),
            git_directory: paths.git_directory().to_path_buf(),
            guid_map_path: config.guid_map_path(),
            table_properties,
            prefix,
            skip_checks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MAIN: &str = r#"
git_directory = "tml"
releases_directory = "/abs/releases"
parent_child_guid_map_file = "guid_map.json"

[table_properties_map]
"DevConn.DB1" = "ProdConn.DB2"

[object_prefix_changes]
previous_env_prefix = "dev_"
new_env_prefix = "prod_"

[environment_config_files]
test = "test"
"#;

    #[test]
    fn main_config_supplies_defaults() {
        let config = ReleaseConfig::parse(MAIN, "/work").unwrap();
        let run =
            RunConfig::from_config(&config, "prod", ContentKind::Table, "r1", false).unwrap();

        assert_eq!(run.source_dir, PathBuf::from("/work/tml/table"));
        assert_eq!(run.release_dir, PathBuf::from("/abs/releases/r1/table"));
        assert_eq!(run.guid_map_path, PathBuf::from("/work/guid_map.json"));
        assert_eq!(run.table_properties.depth(), 2);
        assert_eq!(run.prefix, Some(PrefixRule::new("dev_", "prod_")));
    }

    #[test]
    fn environment_file_falls_back_to_config_suffix() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("test_config.toml"),
            "[table_properties_map]\nDevConn = \"TestConn\"\n",
        )
        .unwrap();
        let config = ReleaseConfig::parse(MAIN, temp.path()).unwrap();

        let run =
            RunConfig::from_config(&config, "test", ContentKind::View, "r2", false).unwrap();
        assert_eq!(run.table_properties.depth(), 1);
        assert_eq!(run.prefix, None);
    }

    #[test]
    fn missing_environment_file_is_config_error() {
        let temp = tempdir().unwrap();
        let config = ReleaseConfig::parse(MAIN, temp.path()).unwrap();
        let err = RunConfig::from_config(&config, "test", ContentKind::View, "r2", false)
            .unwrap_err();
        assert!(matches!(err, ReleaseError::ConfigValidation(_)));
    }

    #[test]
    fn inconsistent_table_map_fails_before_any_path_is_used() {
        let raw = r#"
git_directory = "tml"
releases_directory = "rel"
parent_child_guid_map_file = "map.json"

[table_properties_map]
"A.B" = "C.D"
"A.B.C" = "D.E.F"
"#;
        let config = ReleaseConfig::parse(raw, "/nowhere").unwrap();
        let err =
            RunConfig::from_config(&config, "prod", ContentKind::Table, "r", false).unwrap_err();
        assert!(matches!(err, ReleaseError::ConfigValidation(_)));
    }

    #[test]
    fn identical_prefixes_produce_no_rule() {
        let changes = PrefixChanges {
            previous_env_prefix: Some("x_".into()),
            new_env_prefix: Some("x_".into()),
        };
        assert_eq!(changes.rule(), None);
    }

    #[test]
    fn release_name_with_separator_is_rejected() {
        let config = ReleaseConfig::parse(MAIN, "/work").unwrap();
        let err = RunConfig::from_config(&config, "prod", ContentKind::Table, "../x", false)
            .unwrap_err();
        assert!(matches!(err, ReleaseError::ConfigValidation(_)));
    }
}
