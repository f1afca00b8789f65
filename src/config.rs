use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = ".multiref.json";

/// Controls which files the workspace host looks at.
///
/// `.gitignore` is always respected; these are additional skips.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory *names* to skip anywhere in the tree (e.g. "generated", "third_party").
    pub exclude_dir_names: Vec<String>,
    /// Files larger than this are never parsed.
    pub max_file_bytes: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude_dir_names: vec![],
            // 512 KB
            max_file_bytes: 512 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Command run to reveal a location, one argument per entry.
    ///
    /// `{path}`, `{line}` and `{column}` are substituted (line/column 1-based),
    /// e.g. `["code", "--goto", "{path}:{line}:{column}"]`. Empty means log only.
    pub reveal_command: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub panel: PanelConfig,
}

pub fn load_config(repo_root: &Path) -> Config {
    let path = repo_root.join(CONFIG_FILE_NAME);

    let Ok(text) = std::fs::read_to_string(&path) else { return Config::default() };

    serde_json::from_str::<Config>(&text).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config");
        Config::default()
    })
}
