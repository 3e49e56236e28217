use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::Error;
use crate::grammar::is_identifier;

/// Name of the config file looked up at the working directory root.
pub const CONFIG_FILE: &str = ".clickable-code.toml";

/// Stylesheet shipped with the tool and always registered.
pub const STYLESHEET: &str = "clickable-code.css";

/// Build configuration loaded from `.clickable-code.toml`.
#[derive(Debug)]
pub struct Config {
    /// Class marking annotation overlays inside code blocks.
    pub annotation_class: String,
    /// Text that disables the qualified-name and registry passes when found
    /// in the lookback window.
    pub default_marker: String,
    /// Stylesheets the site must load. Always holds [`STYLESHEET`].
    pub extra_css: Vec<String>,
    /// Explicit full name → URL entries, merged over the site inventory.
    pub links: BTreeMap<String, String>,
    /// Bytes scanned before a match for `default_marker`.
    pub lookback: usize,
    /// Namespace of interest; `None` accepts every indexed symbol.
    pub namespace: Option<String>,
    /// Heading-id inclusion pattern, anchored at the start of the id.
    pub pattern: Option<Regex>,
    /// Prefix of the qualified-name pass (`eds` in `eds.sentences`).
    pub qualified_prefix: String,
    /// Plugin registry sources.
    pub registry: RegistryConfig,
    /// Repository web URL; `None` means ask the VCS for the `origin` remote.
    pub repo_url: Option<String>,
    /// Working directory root. Relative settings resolve against it.
    pub root: PathBuf,
    /// Roots scanned for Python packages, already joined onto `root`.
    pub sources: Vec<PathBuf>,
}

/// The `[registry]` table.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Directories searched for `entry_points.txt` files.
    pub discover: Vec<PathBuf>,
    /// Explicit group → (name → `module:attr`) entries.
    pub groups: BTreeMap<String, BTreeMap<String, String>>,
    /// Entry-point group prefixes kept by discovery and stripped from the
    /// group name.
    pub prefixes: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        return Self {
            discover: Vec::new(),
            groups: BTreeMap::new(),
            prefixes: vec!["spacy_".to_string(), "edsnlp_".to_string()],
        };
    }
}

/// Raw TOML structure for `.clickable-code.toml`.
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ClickableTomlConfig {
    /// See [`Config::annotation_class`].
    #[serde(default = "default_annotation_class")]
    annotation_class: String,
    /// See [`Config::default_marker`].
    #[serde(default = "default_marker")]
    default_marker: String,
    /// See [`Config::extra_css`].
    #[serde(default)]
    extra_css: Vec<String>,
    /// See [`Config::links`].
    #[serde(default)]
    links: BTreeMap<String, String>,
    /// See [`Config::lookback`].
    #[serde(default = "default_lookback")]
    lookback: usize,
    /// See [`Config::namespace`].
    namespace: Option<String>,
    /// See [`Config::pattern`].
    pattern: Option<String>,
    /// See [`Config::qualified_prefix`].
    #[serde(default = "default_qualified_prefix")]
    qualified_prefix: String,
    /// See [`Config::registry`].
    #[serde(default)]
    registry: RegistryConfig,
    /// See [`Config::repo_url`].
    repo_url: Option<String>,
    /// See [`Config::sources`].
    #[serde(default = "default_sources")]
    sources: Vec<PathBuf>,
}

/// Default for `annotation_class`.
fn default_annotation_class() -> String {
    return "md-annotation".to_string();
}

/// Default for `default_marker`.
fn default_marker() -> String {
    return "DEFAULT:".to_string();
}

/// Default for `lookback`.
const fn default_lookback() -> usize {
    return 50;
}

/// Default for `qualified_prefix`.
fn default_qualified_prefix() -> String {
    return "eds".to_string();
}

/// Default for `sources`.
fn default_sources() -> Vec<PathBuf> {
    return vec![PathBuf::from(".")];
}

impl Config {
    /// Load config from `.clickable-code.toml` in `root`.
    /// A missing file yields defaults. A file that exists but is malformed
    /// is an error.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// `Error::TomlDe` if the TOML is malformed, or `Error::InvalidPattern`
    /// if `pattern` or `qualified_prefix` is rejected.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(Error::Io(e)),
        };
        return Self::from_toml(root, &content);
    }

    /// Build a config from TOML text, resolving paths against `root`.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the TOML is malformed, or
    /// `Error::InvalidPattern` if `pattern` or `qualified_prefix` is rejected.
    pub fn from_toml(root: &Path, content: &str) -> Result<Self, Error> {
        let raw: ClickableTomlConfig = toml::from_str(content)?;

        let pattern = raw.pattern.as_deref().map(compile_heading_pattern).transpose()?;
        if !is_identifier(&raw.qualified_prefix) {
            return Err(Error::InvalidPattern {
                pattern: raw.qualified_prefix,
                reason: "not a Python identifier".to_string(),
                setting: "qualified_prefix",
            });
        }

        let mut extra_css = raw.extra_css;
        if !extra_css.iter().any(|css| return css == STYLESHEET) {
            extra_css.push(STYLESHEET.to_string());
        }

        let mut registry = raw.registry;
        registry.discover = registry.discover.iter().map(|dir| return root.join(dir)).collect();

        return Ok(Self {
            annotation_class: raw.annotation_class,
            default_marker: raw.default_marker,
            extra_css,
            links: raw.links,
            lookback: raw.lookback,
            namespace: raw.namespace.filter(|ns| return !ns.is_empty()),
            pattern,
            qualified_prefix: raw.qualified_prefix,
            registry,
            repo_url: raw.repo_url.filter(|url| return !url.is_empty()),
            root: root.to_path_buf(),
            sources: raw.sources.iter().map(|dir| return root.join(dir).components().collect()).collect(),
        });
    }
}

/// Compile a heading-id pattern so it only matches at the start of the id.
fn compile_heading_pattern(pattern: &str) -> Result<Regex, Error> {
    return Regex::new(&format!("^(?:{pattern})")).map_err(|e| {
        return Error::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
            setting: "pattern",
        };
    });
}
