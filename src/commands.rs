//! Core CLI commands for clickable-code: build, page, symbols, info.

use std::path::{Path, PathBuf};

use crate::error;
use crate::page::Linker;
use crate::site::{self, Project};

/// Rewrite every page of a built site in place.
///
/// # Errors
///
/// Returns configuration, indexing, site or page errors.
pub fn build(site_dir: &Path) -> Result<(), error::Error> {
    let root = PathBuf::from(".");
    let project = Project::load(&root)?;
    if project.index.is_empty() {
        log::warn!("no Python definitions found under the configured sources");
    }

    let summary = site::build_site(&project, site_dir)?;
    eprintln!(
        "Linked {} of {} pages ({} documented names, {} indexed symbols)",
        summary.changed,
        summary.pages,
        summary.documented,
        project.index.len()
    );
    return Ok(());
}

/// Output the clickable-code reference document.
///
/// # Errors
///
/// Returns errors from loading the project state or rendering JSON.
pub fn info(json: bool) -> Result<(), error::Error> {
    return crate::info::run(Path::new("."), json);
}

/// Rewrite a single page and print it to stdout. `url` is where the page is
/// served from; `site_dir`, if given, supplies the documentation URLs.
///
/// # Errors
///
/// Returns configuration, indexing or page errors, or `Error::Io` if the
/// page cannot be read.
pub fn page(file: &Path, url: &str, site_dir: Option<&Path>) -> Result<(), error::Error> {
    let root = PathBuf::from(".");
    let project = Project::load(&root)?;
    let inventory = project.inventory(site_dir)?;
    let linker = Linker::new(
        &project.config,
        &project.index,
        &inventory,
        &project.registry,
        &project.state,
    )?;

    let html = std::fs::read_to_string(file)?;
    print!("{}", linker.process_page(&html, url)?);
    return Ok(());
}

/// List every indexed definition, as aligned text or a JSON array.
///
/// # Errors
///
/// Returns configuration or indexing errors, or `Error::Json`.
pub fn symbols(json: bool) -> Result<(), error::Error> {
    let root = PathBuf::from(".");
    let config = crate::config::Config::load(&root)?;
    let index = crate::index::SymbolIndex::build(&config.sources)?;
    let definitions: Vec<_> = index.definitions().collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&definitions)?);
        return Ok(());
    }

    for def in &definitions {
        let location = match (&def.path, def.line) {
            (Some(path), Some(line)) => format!("{}:{line}", path.display()),
            (Some(path), None) => path.display().to_string(),
            (None, _) => "-".to_string(),
        };
        println!("{:<48}  {:<8}  {location}", def.full_name, def.kind);
    }
    return Ok(());
}
