use anyhow::{Context, Result};
use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

use crate::config::ScanConfig;
use crate::syntax::language_config;

fn default_overrides(root: &Path, exclude_dir_names: &[String]) -> Result<Override> {
    let mut ob = OverrideBuilder::new(root);

    // Common build outputs / vendored trees.
    // For directories, add both the entry and its descendants so the walker never descends.
    for d in [
        ".git",
        "node_modules",
        "target",
        "dist",
        "build",
        "out",
        "coverage",
        ".next",
        ".vscode-test",
        "__pycache__",
        ".venv",
    ] {
        ob.add(&format!("!**/{d}"))?;
        ob.add(&format!("!**/{d}/**"))?;
    }

    for d in exclude_dir_names {
        let d = d.trim().trim_matches('/');
        if d.is_empty() {
            continue;
        }
        ob.add(&format!("!**/{d}"))?;
        ob.add(&format!("!**/{d}/**"))?;
    }

    Ok(ob.build()?)
}

#[derive(Debug, Clone)]
pub struct FileEntry {
    pub abs_path: PathBuf,
    pub rel_path: PathBuf,
}

/// Source files under `root` that a language driver can parse, sorted by relative path.
pub fn scan_sources(root: &Path, cfg: &ScanConfig) -> Result<Vec<FileEntry>> {
    let meta = std::fs::metadata(root)
        .with_context(|| format!("Workspace root does not exist: {}", root.display()))?;
    if !meta.is_dir() {
        anyhow::bail!("Workspace root is not a directory: {}", root.display());
    }

    let overrides = default_overrides(root, &cfg.exclude_dir_names)?;
    let walker = WalkBuilder::new(root)
        .standard_filters(true) // .gitignore, .ignore, hidden, etc.
        .overrides(overrides)
        .build();

    let langs = language_config();
    let mut entries = Vec::new();

    for item in walker {
        let dent = match item {
            Ok(d) => d,
            Err(_) => continue,
        };

        if !dent.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        if langs.driver_for_path(dent.path()).is_none() {
            continue;
        }

        let bytes = match dent.metadata().map(|m| m.len()) {
            Ok(b) => b,
            Err(_) => continue,
        };
        if bytes == 0 || bytes > cfg.max_file_bytes {
            continue;
        }

        let abs_path = dent.into_path();
        let rel_path = abs_path
            .strip_prefix(root)
            .with_context(|| format!("{} is not under {}", abs_path.display(), root.display()))?
            .to_path_buf();

        entries.push(FileEntry { abs_path, rel_path });
    }

    entries.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(entries)
}

/// Read a file as UTF-8 text, rejecting binaries.
pub fn read_source(path: &Path) -> Result<String> {
    let raw = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if raw.contains(&0u8) {
        anyhow::bail!("{} looks binary", path.display());
    }
    String::from_utf8(raw).with_context(|| format!("{} is not valid UTF-8", path.display()))
}
