use std::cell::OnceCell;
use std::path::PathBuf;

use tmlrelease::{DEFAULT_CONFIG_FILE, ReleaseConfig};

use crate::error::{CliError, ExitStatus};
use crate::util::Verbosity;

pub struct CliSession {
    pub config_path: PathBuf,
    pub verbosity: Verbosity,
    config: OnceCell<ReleaseConfig>,
}

impl CliSession {
    pub fn bootstrap(config_override: Option<String>, verbosity: Verbosity) -> Self {
        let config_path = config_override
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self {
            config_path,
            verbosity,
            config: OnceCell::new(),
        }
    }

    /// Loads the release config on first use; commands that only read TML files never
    /// touch it.
    pub fn config(&self) -> Result<&ReleaseConfig, CliError> {
        if let Some(config) = self.config.get() {
            return Ok(config);
        }
        if !self.config_path.is_file() {
            return Err(CliError::new(
                format!(
                    "configuration file {} not found",
                    self.config_path.display()
                ),
                ExitStatus::Config,
            ));
        }
        let loaded = ReleaseConfig::load(&self.config_path)?;
        if self.verbosity.verbose {
            let paths = loaded.paths();
            tracing::info!(
                config = %self.config_path.display(),
                git_directory = %paths.git_directory().display(),
                releases_directory = %paths.releases_directory().display(),
                guid_map = %loaded.guid_map_path().display(),
                "loaded release configuration"
            );
        }
        Ok(self.config.get_or_init(|| loaded))
    }
}
