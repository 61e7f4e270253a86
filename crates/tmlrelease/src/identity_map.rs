use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ReleaseError;

/// Parent (source environment) identifier to child (destination environment) identifier.
pub type GuidMap = BTreeMap<String, String>;

/// Persistent parent→child identifier mapping, keyed first by environment name.
///
/// On disk this is `{ "<environment>": { "<parent>": "<child>" } }`. Ordered maps keep
/// the file stable between runs so it can live in version control next to the TML tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityMap {
    environments: BTreeMap<String, GuidMap>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the map, writing an empty `{environment: {}}` file first when none exists.
    pub fn load(path: &Path, environment: &str) -> Result<Self, ReleaseError> {
        let mut map = if path.exists() {
            let raw = fs::read_to_string(path)?;
            serde_json::from_str::<IdentityMap>(&raw)
                .map_err(|err| ReleaseError::from(err).context(path.display()))?
        } else {
            let mut fresh = IdentityMap::new();
            fresh.ensure_environment(environment);
            fresh.save(path)?;
            tracing::info!(path = %path.display(), environment, "created identity map file");
            fresh
        };
        map.ensure_environment(environment);
        Ok(map)
    }

    /// Overwrites `path` with the full multi-environment map.
    pub fn save(&self, path: &Path) -> Result<(), ReleaseError> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let mut body = serde_json::to_string_pretty(self)?;
        body.push('\n');
        fs::write(path, body)?;
        Ok(())
    }

    pub fn ensure_environment(&mut self, environment: &str) {
        self.environments
            .entry(environment.to_string())
            .or_default();
    }

    pub fn get(&self, environment: &str, parent: &str) -> Option<&str> {
        self.environments
            .get(environment)?
            .get(parent)
            .map(String::as_str)
    }

    /// Records the child for `(environment, parent)`, replacing any earlier child.
    pub fn put(
        &mut self,
        environment: &str,
        parent: impl Into<String>,
        child: impl Into<String>,
    ) -> Option<String> {
        self.environments
            .entry(environment.to_string())
            .or_default()
            .insert(parent.into(), child.into())
    }

    /// Mapping for one environment; empty when the environment is unknown.
    pub fn environment(&self, environment: &str) -> &GuidMap {
        static EMPTY: GuidMap = BTreeMap::new();
        self.environments.get(environment).unwrap_or(&EMPTY)
    }

    pub fn environments(&self) -> impl Iterator<Item = &str> {
        self.environments.keys().map(String::as_str)
    }
}
