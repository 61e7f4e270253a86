use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Publish order that keeps every reference resolvable.
pub const PUBLISH_ORDER: &str = "table, view, worksheet, answer/liveboard";

/// High-level error type shared across the release pipeline.
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("configuration error: {0}")]
    ConfigValidation(String),
    #[error("format error{}: {message}", location(.path))]
    Format {
        path: Option<PathBuf>,
        message: String,
    },
    #[error(
        "unresolved reference in {document}: no mapped identifier for {}; publish objects in the order {} before building this release",
        .references.join(", "),
        PUBLISH_ORDER
    )]
    UnresolvedReference {
        document: String,
        references: Vec<String>,
    },
    #[error("publish error: {0}")]
    Publish(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn location(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" in {}", p.display()))
        .unwrap_or_default()
}

impl From<serde_json::Error> for ReleaseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for ReleaseError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ReleaseError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigValidation(err.to_string())
    }
}

impl ReleaseError {
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            path: None,
            message: message.into(),
        }
    }

    /// Attaches the file a format error came from, leaving other variants alone.
    pub fn at_path(self, path: impl Into<PathBuf>) -> Self {
        match self {
            ReleaseError::Format { path: None, message } => ReleaseError::Format {
                path: Some(path.into()),
                message,
            },
            other => other,
        }
    }

    pub fn context<T: fmt::Display>(self, ctx: T) -> Self {
        match self {
            ReleaseError::ConfigValidation(msg) => {
                ReleaseError::ConfigValidation(format!("{ctx}: {msg}"))
            }
            ReleaseError::Format { path, message } => ReleaseError::Format {
                path,
                message: format!("{ctx}: {message}"),
            },
            ReleaseError::UnresolvedReference {
                document,
                references,
            } => ReleaseError::UnresolvedReference {
                document,
                references,
            },
            ReleaseError::Publish(msg) => ReleaseError::Publish(format!("{ctx}: {msg}")),
            ReleaseError::Serialization(msg) => {
                ReleaseError::Serialization(format!("{ctx}: {msg}"))
            }
            ReleaseError::Io(err) => {
                ReleaseError::Io(std::io::Error::new(err.kind(), format!("{ctx}: {err}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_reference_names_publish_order() {
        let err = ReleaseError::UnresolvedReference {
            document: "abc.worksheet.tml".into(),
            references: vec!["Orders".into()],
        };
        let message = err.to_string();
        assert!(message.contains("abc.worksheet.tml"));
        assert!(message.contains("Orders"));
        assert!(message.contains(PUBLISH_ORDER));
    }

    #[test]
    fn at_path_only_fills_missing_format_path() {
        let err = ReleaseError::format("no content key").at_path("a.table.tml");
        assert_eq!(
            err.to_string(),
            "format error in a.table.tml: no content key"
        );

        let io = ReleaseError::Io(std::io::Error::other("denied")).at_path("x");
        assert!(matches!(io, ReleaseError::Io(_)));
    }
}
