use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::content::MAX_COMMUNITY_NAME_LEN;
use crate::{ConfigError, CoreError};

const MIN_NAME_LEN: usize = 2;
// The forum itself caps names at 21 characters, well inside the column width.
const MAX_FORUM_NAME_LEN: usize = 21;
const MAX_DISPLAY_NAME_LEN: usize = 100;
const RESERVED_NAMES: &[&str] = &["admin", "reddit", "moderator", "mod", "null", "undefined"];

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]+$").expect("valid community name regex"));

/// A community to track, as configured or discovered by the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommunity {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subscribers: Option<i32>,
}

impl NewCommunity {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: None,
            subscribers: None,
        }
    }

    /// Canonical name, validated.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] if the name, display name, or subscriber count
    /// is invalid.
    pub fn validate(&self) -> Result<String, CoreError> {
        let name = normalize_community_name(&self.name);
        validate_community_name(&name)?;

        if let Some(display) = &self.display_name {
            let actual = display.chars().count();
            if actual > MAX_DISPLAY_NAME_LEN {
                return Err(CoreError::TooLong {
                    field: "community display_name",
                    max: MAX_DISPLAY_NAME_LEN,
                    actual,
                });
            }
        }
        if let Some(subs) = self.subscribers {
            if subs < 0 {
                return Err(CoreError::OutOfRange {
                    field: "community subscribers",
                    reason: format!("{subs} is negative"),
                });
            }
        }
        Ok(name)
    }

    /// Display name to store when none was supplied, e.g. `r/golang`.
    #[must_use]
    pub fn display_name_or_default(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| format!("r/{}", normalize_community_name(&self.name)))
    }
}

/// Strip an `r/` or `/r/` prefix, surrounding whitespace, and case.
#[must_use]
pub fn normalize_community_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_lowercase();
    let stripped = lower
        .strip_prefix("/r/")
        .or_else(|| lower.strip_prefix("r/"))
        .unwrap_or(&lower);
    stripped.to_string()
}

/// Check an already-normalized community name.
///
/// # Errors
///
/// Returns [`CoreError::InvalidCommunityName`] describing the first rule the
/// name breaks.
pub fn validate_community_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::InvalidCommunityName(
            "name cannot be empty".to_string(),
        ));
    }
    let len = name.chars().count();
    if len < MIN_NAME_LEN {
        return Err(CoreError::InvalidCommunityName(format!(
            "'{name}' must be at least {MIN_NAME_LEN} characters"
        )));
    }
    if len > MAX_FORUM_NAME_LEN.min(MAX_COMMUNITY_NAME_LEN) {
        return Err(CoreError::InvalidCommunityName(format!(
            "'{name}' cannot exceed {MAX_FORUM_NAME_LEN} characters"
        )));
    }
    if !NAME_RE.is_match(name) {
        return Err(CoreError::InvalidCommunityName(format!(
            "'{name}' may only contain letters, numbers, and underscores"
        )));
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(CoreError::InvalidCommunityName(format!(
            "'{name}' is a reserved name"
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CommunitiesFile {
    pub communities: Vec<NewCommunity>,
}

/// Load and validate the tracked-communities seed file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_communities(path: &Path) -> Result<CommunitiesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CommunitiesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_communities(&content)
}

fn parse_communities(content: &str) -> Result<CommunitiesFile, ConfigError> {
    let file: CommunitiesFile =
        serde_yaml::from_str(content).map_err(ConfigError::CommunitiesFileParse)?;
    validate_communities(&file)?;
    Ok(file)
}

fn validate_communities(file: &CommunitiesFile) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for community in &file.communities {
        let name = community
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        if !seen.insert(name.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate community: '{name}' (from '{}')",
                community.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "communities_test.rs"]
mod tests;
