//! Engine configuration.
//!
//! # Responsibility
//! - Hold caller-tunable defaults for naming and selection behavior.
//! - Parse and validate configuration supplied as JSON by the host app.
//!
//! # Invariants
//! - Missing fields fall back to `EngineConfig::default()`.
//! - A validated config never yields blank default names.

use crate::model::node::NodeKind;
use crate::tree::selection::SelectionMode;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const DEFAULT_FOLDER_NAME: &str = "Untitled folder";
const DEFAULT_DOCUMENT_NAME: &str = "Untitled document";
const DEFAULT_MAX_NAME_CHARS: usize = 255;

/// Tunables shared by the action dispatcher and the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Selection propagation rule used by the session.
    pub selection_mode: SelectionMode,
    /// Name given to folders created without one.
    pub default_folder_name: String,
    /// Name given to documents created without one.
    pub default_document_name: String,
    /// Upper bound for node names, in characters.
    pub max_name_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            selection_mode: SelectionMode::default(),
            default_folder_name: DEFAULT_FOLDER_NAME.to_string(),
            default_document_name: DEFAULT_DOCUMENT_NAME.to_string(),
            max_name_chars: DEFAULT_MAX_NAME_CHARS,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks field-level invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_folder_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "default_folder_name",
                reason: "must not be blank",
            });
        }
        if self.default_document_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "default_document_name",
                reason: "must not be blank",
            });
        }
        if self.max_name_chars == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_name_chars",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }

    /// Default display name for a newly created node of `kind`.
    pub fn default_name(&self, kind: NodeKind) -> &str {
        match kind {
            NodeKind::Folder => self.default_folder_name.as_str(),
            NodeKind::Document => self.default_document_name.as_str(),
        }
    }
}

/// Configuration parse/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Input is not valid JSON for `EngineConfig`.
    Json(serde_json::Error),
    /// A field holds an unusable value.
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid engine config: {err}"),
            Self::InvalidValue { field, reason } => {
                write!(f, "invalid engine config field `{field}`: {reason}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}
