//! Plugin/factory registry: group → (name → `module:attr` target).
//!
//! Assembled once per build from explicit config tables and from
//! `entry_points.txt` files of installed distributions, then read-only.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::RegistryConfig;
use crate::error::Error;

/// File name holding entry points inside a `*.dist-info` or `*.egg-info`
/// directory.
const ENTRY_POINTS_FILE: &str = "entry_points.txt";

/// How deep discovery descends below each configured directory.
const DISCOVER_DEPTH: usize = 3;

/// Group of the qualified-name pass.
pub const FACTORIES: &str = "factories";

/// Immutable registry of named plugin targets.
#[derive(Debug, Default)]
pub struct Registry {
    /// group → name → `module:attr`.
    groups: BTreeMap<String, BTreeMap<String, String>>,
}

impl Registry {
    /// Discover entry points under the configured directories, then layer the
    /// explicit `[registry.groups]` tables on top.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if a discovered `entry_points.txt` cannot be read.
    pub fn build(config: &RegistryConfig) -> Result<Self, Error> {
        let mut registry = Self::default();
        let found = registry.discover(&config.discover, &config.prefixes)?;
        log::debug!("discovered {found} entry points");
        for (group, entries) in &config.groups {
            let slot = registry.groups.entry(group.clone()).or_default();
            for (name, target) in entries {
                slot.insert(name.clone(), target.clone());
            }
        }
        return Ok(registry);
    }

    /// Read every `entry_points.txt` below `dirs`. Only groups starting with
    /// one of `prefixes` are kept, renamed without the prefix
    /// (`spacy_factories` → `factories`). Returns the number of entries added.
    /// Missing directories are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if an entry-points file cannot be read.
    pub fn discover(&mut self, dirs: &[PathBuf], prefixes: &[String]) -> Result<usize, Error> {
        let mut added = 0usize;
        for dir in dirs {
            if !dir.is_dir() {
                log::warn!("registry discovery directory not found: {}", dir.display());
                continue;
            }
            for file in entry_point_files(dir) {
                let content = std::fs::read_to_string(&file)?;
                for (group, name, target) in parse_entry_points(&content, prefixes) {
                    self.groups.entry(group).or_default().insert(name, target);
                    added = added.saturating_add(1);
                }
            }
        }
        return Ok(added);
    }

    /// Whether the registry holds no entries at all.
    pub fn is_empty(&self) -> bool {
        return self.groups.values().all(BTreeMap::is_empty);
    }

    /// Raw `module:attr` target registered as `name` within `group`.
    pub fn lookup(&self, group: &str, name: &str) -> Option<&str> {
        return self.groups.get(group)?.get(name).map(String::as_str);
    }

    /// Fully qualified dotted name of the target registered as `name`
    /// within `group` (`pkg.mod:Cls` → `pkg.mod.Cls`).
    pub fn target_name(&self, group: &str, name: &str) -> Option<String> {
        return self.lookup(group, name).map(|target| return target.replace(':', "."));
    }
}

/// Every `entry_points.txt` below `dir`, sorted for a stable merge order.
fn entry_point_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(DISCOVER_DEPTH)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| return entry.file_type().is_file() && entry.file_name() == ENTRY_POINTS_FILE)
        .map(walkdir::DirEntry::into_path)
        .collect();
    files.sort();
    return files;
}

/// Parse the INI-style entry-points format into (group, name, target).
fn parse_entry_points(content: &str, prefixes: &[String]) -> Vec<(String, String, String)> {
    let mut entries = Vec::new();
    let mut group: Option<String> = None;

    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| return l.strip_suffix(']')) {
            group = prefixes
                .iter()
                .find_map(|prefix| return section.trim().strip_prefix(prefix.as_str()))
                .filter(|rest| return !rest.is_empty())
                .map(String::from);
            continue;
        }
        let Some(group) = &group else {
            continue;
        };
        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        // Drop extras such as `pkg.mod:attr [gpu]`.
        let target = value.split('[').next().unwrap_or_default().trim();
        let name = name.trim();
        if name.is_empty() || target.is_empty() {
            continue;
        }
        entries.push((group.clone(), name.to_string(), target.to_string()));
    }
    return entries;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests")]
mod tests {
    use super::*;

    const ENTRY_POINTS: &str = "\
[console_scripts]
demo = demo_package.cli:main

[spacy_factories]
eds.average = demo_package.math:MovingAverage

; comment
[edsnlp_misc]
adder = demo_package.math:add [extra]
";

    fn prefixes() -> Vec<String> {
        RegistryConfig::default().prefixes
    }

    #[test]
    fn parses_prefixed_groups_only() {
        let entries = parse_entry_points(ENTRY_POINTS, &prefixes());
        assert_eq!(
            entries,
            vec![
                ("factories".to_string(), "eds.average".to_string(), "demo_package.math:MovingAverage".to_string()),
                ("misc".to_string(), "adder".to_string(), "demo_package.math:add".to_string()),
            ]
        );
    }

    #[test]
    fn discovers_dist_info_files_and_config_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let dist = dir.path().join("demo_package-0.1.dist-info");
        std::fs::create_dir_all(&dist).unwrap();
        std::fs::write(dist.join(ENTRY_POINTS_FILE), ENTRY_POINTS).unwrap();

        let mut config = RegistryConfig::default();
        config.discover = vec![dir.path().to_path_buf(), dir.path().join("missing")];
        config.groups.insert(
            "misc".to_string(),
            BTreeMap::from([("adder".to_string(), "demo_package:add".to_string())]),
        );

        let registry = Registry::build(&config).unwrap();
        assert_eq!(registry.lookup(FACTORIES, "eds.average"), Some("demo_package.math:MovingAverage"));
        assert_eq!(registry.target_name("misc", "adder").as_deref(), Some("demo_package.add"));
        assert!(registry.lookup(FACTORIES, "eds.unknown").is_none());
        assert!(registry.lookup("scripts", "demo").is_none());
    }

    #[test]
    fn empty_registry() {
        let registry = Registry::build(&RegistryConfig::default()).unwrap();
        assert!(registry.is_empty());
    }
}
