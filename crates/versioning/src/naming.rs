//! Naming rules for series, version identifiers and containers
//!
//! A version identifier is a fixed-width `YYYYMMDD_HHMMSS` timestamp, so
//! string order equals chronological order and it is the only ordering key.
//! Anything that does not have exactly that shape is not a version.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sync_core::{Error, Result};

/// chrono format of a version identifier
pub const VERSION_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Length of a version identifier (14 digits plus the separator)
pub const VERSION_LEN: usize = 15;

static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{8}_[0-9]{6}$").expect("version pattern is valid"));

// Allow alphanumeric, hyphens, underscores, and dots
static SERIES_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_\-\.]+$").expect("series pattern is valid"));

/// Sortable timestamp naming one upload attempt
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionId(String);

impl VersionId {
    /// Identifier for an instant (second resolution; sub-second collisions are accepted)
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.format(VERSION_FORMAT).to_string())
    }

    /// Identifier for the current wall-clock time
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Parse a candidate name, returning `None` unless it has exactly the identifier shape
    pub fn parse(name: &str) -> Option<Self> {
        if name.len() != VERSION_LEN || !VERSION_PATTERN.is_match(name) {
            return None;
        }
        // Shape alone admits "20251399_999999"
        NaiveDateTime::parse_from_str(name, VERSION_FORMAT).ok()?;
        Some(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The instant this identifier encodes
    pub fn timestamp(&self) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(&self.0, VERSION_FORMAT)
            .map(|naive| naive.and_utc())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VersionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::MalformedName {
            name: s.to_string(),
        })
    }
}

impl TryFrom<String> for VersionId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<VersionId> for String {
    fn from(value: VersionId) -> Self {
        value.0
    }
}

/// Logical name of one training run's checkpoint lineage
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Series(String);

impl Series {
    /// Validate a series name; it becomes part of remote keys, so separators are rejected
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name == "." || name == ".." || !SERIES_PATTERN.is_match(&name) {
            return Err(Error::InvalidConfig {
                message: format!(
                    "invalid series name {:?}: only alphanumeric, hyphens, underscores, and dots are allowed",
                    name
                ),
            });
        }
        Ok(Self(name))
    }

    /// Derive the series from a directory's base name
    pub fn from_path(path: &Path) -> Result<Self> {
        let base = match path.file_name() {
            Some(name) => name.to_os_string(),
            None => std::path::absolute(path)?
                .file_name()
                .map(|n| n.to_os_string())
                .ok_or_else(|| Error::InvalidConfig {
                    message: format!("cannot derive a series name from {}", path.display()),
                })?,
        };
        Self::new(base.to_string_lossy().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Series {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Series> for String {
    fn from(value: Series) -> Self {
        value.0
    }
}

/// Name of a dedicated per-version container: `{series}-{version}`
pub fn container_name(series: &Series, version: &VersionId) -> String {
    format!("{}-{}", series, version)
}

/// Extract the version from a dedicated container name belonging to `series`
///
/// Prefix match plus a strict identifier parse, so `run-a-…` never leaks into `run`.
pub fn parse_container_name(series: &Series, name: &str) -> Option<VersionId> {
    name.strip_prefix(series.as_str())?
        .strip_prefix('-')
        .and_then(VersionId::parse)
}
