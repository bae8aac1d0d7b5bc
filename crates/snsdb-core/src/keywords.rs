use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Platform};

/// Search keywords rotated across runs for one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordPool {
    pub keywords: Vec<String>,
    /// Overrides `SNSDB_KEYWORDS_PER_RUN` for this platform.
    #[serde(default)]
    pub keywords_per_run: Option<usize>,
}

impl KeywordPool {
    #[must_use]
    pub fn per_run(&self, default: usize) -> usize {
        self.keywords_per_run.unwrap_or(default)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordPoolsFile {
    pub platforms: BTreeMap<Platform, KeywordPool>,
}

impl KeywordPoolsFile {
    #[must_use]
    pub fn pool(&self, platform: Platform) -> Option<&KeywordPool> {
        self.platforms.get(&platform)
    }

    /// Platforms with a configured pool, in a stable order.
    #[must_use]
    pub fn platforms(&self) -> Vec<Platform> {
        self.platforms.keys().copied().collect()
    }
}

/// Load and validate the keyword pools from a YAML file.
///
/// Keywords are trimmed on load.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_keyword_pools(path: &Path) -> Result<KeywordPoolsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::KeywordsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_keyword_pools(&content)
}

pub(crate) fn parse_keyword_pools(content: &str) -> Result<KeywordPoolsFile, ConfigError> {
    let mut file: KeywordPoolsFile =
        serde_yaml::from_str(content).map_err(ConfigError::KeywordsFileParse)?;

    for pool in file.platforms.values_mut() {
        for kw in &mut pool.keywords {
            *kw = kw.trim().to_string();
        }
    }

    validate_pools(&file)?;
    Ok(file)
}

fn validate_pools(file: &KeywordPoolsFile) -> Result<(), ConfigError> {
    if file.platforms.is_empty() {
        return Err(ConfigError::Validation(
            "keywords file must configure at least one platform".to_string(),
        ));
    }

    for (platform, pool) in &file.platforms {
        if pool.keywords.is_empty() {
            return Err(ConfigError::Validation(format!(
                "keyword pool for '{platform}' is empty"
            )));
        }
        if pool.keywords_per_run == Some(0) {
            return Err(ConfigError::Validation(format!(
                "keywords_per_run for '{platform}' must be at least 1"
            )));
        }

        let mut seen = HashSet::new();
        for kw in &pool.keywords {
            if kw.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "keyword pool for '{platform}' contains a blank keyword"
                )));
            }
            if !seen.insert(kw.to_lowercase()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate keyword '{kw}' in pool for '{platform}'"
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "keywords_test.rs"]
mod tests;
