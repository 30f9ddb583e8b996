//! Job configuration.
//!
//! A [`LinkConfig`] describes one linking run: where the input and
//! destination tables live, which columns identify a row's entity, and
//! where to write the result. It is read from JSON; the binary lets flags
//! override individual fields.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, LinkError, LinkResult};
use crate::table::{BindingOptions, ColumnRef};

fn default_true() -> bool {
    true
}

/// One table the job reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSource {
    /// CSV file.
    pub path: PathBuf,
    /// Column holding the row key; rows are numbered from 1 when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_column: Option<String>,
    /// Candidate columns, highest priority first. `@key` names the row key.
    pub candidates: Vec<String>,
    /// Both tables introduce entities by default.
    #[serde(default = "BindingOptions::introducing")]
    pub binding: BindingOptions,
}

impl TableSource {
    /// Creates a source with introducing binding options.
    pub fn new<I, S>(path: impl Into<PathBuf>, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into(),
            key_column: None,
            candidates: candidates.into_iter().map(Into::into).collect(),
            binding: BindingOptions::introducing(),
        }
    }

    /// Candidate columns as references.
    #[must_use]
    pub fn candidate_refs(&self) -> Vec<ColumnRef> {
        self.candidates.iter().map(|c| ColumnRef::parse(c)).collect()
    }

    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            section: section.to_string(),
            reason,
        };
        if self.candidates.is_empty() {
            return Err(invalid("at least one candidate column is required".to_string()));
        }
        if let Some(blank) = self.candidates.iter().position(|c| c.trim().is_empty()) {
            return Err(invalid(format!("candidate {} is blank", blank + 1)));
        }
        if let Some((index, _)) = self
            .candidates
            .iter()
            .enumerate()
            .find(|(i, c)| self.candidates[..*i].contains(c))
        {
            return Err(invalid(format!(
                "candidate '{}' is listed twice",
                self.candidates[index]
            )));
        }
        if matches!(&self.key_column, Some(key) if key.trim().is_empty()) {
            return Err(invalid("key_column is blank".to_string()));
        }
        Ok(())
    }
}

/// A full linking job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Table whose rows are re-keyed by entity and written out.
    pub input: TableSource,
    /// Table whose labels the output is linked to.
    pub destination: TableSource,
    /// Output CSV.
    pub output: PathBuf,
    /// Ask an operator about unmatched entities.
    #[serde(default = "default_true")]
    pub interactive: bool,
    /// Optional JSON reconciliation report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<PathBuf>,
    /// Destination candidate whose value labels each output row. Defaults
    /// to the destination's first candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_column: Option<String>,
}

impl LinkConfig {
    /// Name of the column added to the output.
    pub const LABEL_HEADER: &'static str = "destination";

    /// Parses and validates a JSON config.
    ///
    /// # Errors
    /// `Parse` for malformed JSON, `Invalid` for failed validation.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    ///
    /// # Errors
    /// `Io` if the file cannot be read, otherwise see [`LinkConfig::from_json_str`].
    pub fn load(path: impl AsRef<Path>) -> LinkResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| LinkError::io(path, e))?;
        Ok(Self::from_json_str(&json)?)
    }

    /// Checks the config for values no run could succeed with.
    ///
    /// # Errors
    /// `Invalid` naming the section at fault.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.input.validate("input")?;
        self.destination.validate("destination")?;
        if self.output.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                section: "output".to_string(),
                reason: "path is empty".to_string(),
            });
        }
        if let Some(label) = &self.label_column {
            if !self.destination.candidates.contains(label) {
                return Err(ConfigError::Invalid {
                    section: "label_column".to_string(),
                    reason: format!("'{label}' is not a destination candidate"),
                });
            }
        }
        Ok(())
    }

    /// Destination column used to label output rows: `label_column`, or the
    /// first destination candidate.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` when neither is set.
    pub fn label_ref(&self) -> Result<ColumnRef, ConfigError> {
        let label = self
            .label_column
            .as_ref()
            .or_else(|| self.destination.candidates.first())
            .ok_or_else(|| ConfigError::Invalid {
                section: "destination".to_string(),
                reason: "no candidate column to label output rows".to_string(),
            })?;
        Ok(ColumnRef::parse(label))
    }
}
