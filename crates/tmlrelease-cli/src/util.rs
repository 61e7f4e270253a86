use std::path::Path;

use crate::error::{CliError, ExitStatus};

#[derive(Clone, Copy, Debug, Default)]
pub struct Verbosity {
    pub json: bool,
    pub verbose: bool,
}

pub fn require_non_empty(value: &str, field: &str) -> Result<(), CliError> {
    if value.trim().is_empty() {
        return Err(CliError::new(
            format!("{field} must not be empty"),
            ExitStatus::Usage,
        ));
    }
    Ok(())
}

pub fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
