use std::path::Path;

use serde::Serialize;

use crate::config::{CONFIG_FILE, Config};
use crate::error::Error;
use crate::index::SymbolIndex;
use crate::page::PageState;
use crate::registry::Registry;
use crate::vcs::Git;

/// Output the clickable-code reference document with the current build state.
///
/// # Errors
///
/// Returns configuration, indexing or registry errors, or `Error::Json` if
/// the JSON document cannot be rendered.
pub fn run(root: &Path, json: bool) -> Result<(), Error> {
    let state = gather_state(root)?;

    if json {
        print_json(&state)?;
    } else {
        print_markdown(&state);
    }
    return Ok(());
}

// ── State gathering ───────────────────────────────────────────────────

/// What the build would see if it ran now.
struct CurrentState {
    /// Commit source links are pinned to.
    commit: String,
    /// Whether `.clickable-code.toml` exists.
    config_found: bool,
    /// Number of indexed definitions.
    definitions: usize,
    /// Namespace of interest, if any.
    namespace: Option<String>,
    /// Whether the registry has no entries.
    registry_empty: bool,
    /// Normalized repository URL, if known.
    repo_url: Option<String>,
    /// Configured source roots.
    sources: Vec<String>,
}

/// Load everything a build would load, without touching a site.
fn gather_state(root: &Path) -> Result<CurrentState, Error> {
    let config = Config::load(root)?;
    let index = SymbolIndex::build(&config.sources)?;
    let registry = Registry::build(&config.registry)?;
    let page_state = PageState::discover(&config, &Git::new(root));

    return Ok(CurrentState {
        commit: page_state.commit,
        config_found: root.join(CONFIG_FILE).is_file(),
        definitions: index.definitions().count(),
        namespace: config.namespace,
        registry_empty: registry.is_empty(),
        repo_url: page_state.repo_url,
        sources: config.sources.iter().map(|s| return s.display().to_string()).collect(),
    });
}

// ── Markdown output ───────────────────────────────────────────────────

/// Print the reference document as markdown.
fn print_markdown(state: &CurrentState) {
    let version = env!("CARGO_PKG_VERSION");
    print_markdown_header(version);
    print_markdown_state(state);
    println!();
    print_markdown_exit_codes();
}

/// Print everything that does not depend on the current state.
fn print_markdown_header(version: &str) {
    print!(
        "\
# clickable-code {version}

Link code identifiers in rendered documentation HTML to their reference pages,
and append pinned [source] links to headings that name a library symbol.

## Workflow

    clickable-code build <site_dir>                 Rewrite every page of a built site in place
    clickable-code page <file> --url <path>         Rewrite one page to stdout
    clickable-code symbols [--json]                 List indexed definitions
    clickable-code info [--json]                    Show this document

## Passes (in order)

    1. eds.NAME             qualified names registered as factories
    2. \"@group\": \"name\"     registry values inside highlighted code
    3. code blocks          identifiers resolved against the indexed sources
    4. href / src           absolute links made relative to the page
    5. headings             [source] link for ids such as pkg.mod.func

## Configuration (.clickable-code.toml)

    repo_url = \"https://github.com/org/repo\"   # default: git remote get-url origin
    pattern = \"demo_package\"                   # heading ids must start with this
    namespace = \"demo_package\"                 # only link symbols under this
    sources = [\".\"]                            # roots holding Python packages

    [links]
    \"demo_package.add\" = \"/reference/#demo_package.add\"

    [registry]
    discover = [\".venv/lib/python3.11/site-packages\"]

    [registry.groups.factories]
    \"eds.average\" = \"demo_package.math:MovingAverage\"

## Current State

"
    );
}

/// Print the state gathered from the working directory.
fn print_markdown_state(state: &CurrentState) {
    if state.config_found {
        println!("Config:      {CONFIG_FILE} (found)");
    } else {
        println!("Config:      {CONFIG_FILE} (not found, using defaults)");
    }
    println!("Sources:     {}", state.sources.join(", "));
    println!("Symbols:     {}", state.definitions);
    println!("Namespace:   {}", state.namespace.as_deref().unwrap_or("(any)"));
    println!("Registry:    {}", if state.registry_empty { "(empty)" } else { "loaded" });
    println!("Commit:      {}", state.commit);
    println!("Repository:  {}", state.repo_url.as_deref().unwrap_or("(none)"));
}

/// Print the exit-code table.
fn print_markdown_exit_codes() {
    print!(
        "\
## Exit Codes

| Code | Meaning |
|------|---------|
| 0    | Success |
| 1    | Error (diagnostic on stderr) |
"
    );
}

// ── JSON output ───────────────────────────────────────────────────────

/// Top-level JSON document.
#[derive(Serialize)]
struct InfoJson {
    /// Current build state.
    current_state: StateJson,
    /// Exit codes and their meaning.
    exit_codes: Vec<ExitCodeInfo>,
    /// Crate version.
    version: String,
}

/// One exit code.
#[derive(Serialize)]
struct ExitCodeInfo {
    /// Process exit code.
    code: u8,
    /// What it means.
    meaning: String,
}

/// JSON view of [`CurrentState`].
#[derive(Serialize)]
struct StateJson {
    /// See [`CurrentState::commit`].
    commit: String,
    /// See [`CurrentState::config_found`].
    config_found: bool,
    /// See [`CurrentState::definitions`].
    definitions: usize,
    /// See [`CurrentState::namespace`].
    namespace: Option<String>,
    /// See [`CurrentState::registry_empty`].
    registry_empty: bool,
    /// See [`CurrentState::repo_url`].
    repo_url: Option<String>,
    /// See [`CurrentState::sources`].
    sources: Vec<String>,
}

/// Print the reference document as JSON.
fn print_json(state: &CurrentState) -> Result<(), Error> {
    let info = InfoJson {
        current_state: StateJson {
            commit: state.commit.clone(),
            config_found: state.config_found,
            definitions: state.definitions,
            namespace: state.namespace.clone(),
            registry_empty: state.registry_empty,
            repo_url: state.repo_url.clone(),
            sources: state.sources.clone(),
        },
        exit_codes: vec![
            ExitCodeInfo {
                code: 0,
                meaning: "Success".to_string(),
            },
            ExitCodeInfo {
                code: 1,
                meaning: "Error (diagnostic on stderr)".to_string(),
            },
        ],
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    println!("{}", serde_json::to_string_pretty(&info)?);
    return Ok(());
}
