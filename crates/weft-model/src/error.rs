use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid page map name: {0:?}")]
    InvalidPageMapName(String),

    #[error("invalid component path: {0:?}")]
    InvalidComponentPath(String),

    #[error("invalid page path: {0:?}")]
    InvalidPagePath(String),

    #[error("unknown listener interface: {0}")]
    UnknownInterface(String),

    #[error("invalid {field} number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("failed to read settings {path}: {source}")]
    SettingsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings from {origin}: {source}")]
    SettingsToml {
        origin: String,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, ModelError>;
