//! Whole-site build: load everything once, then rewrite every page in
//! parallel.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::config::{Config, STYLESHEET};
use crate::error::Error;
use crate::index::SymbolIndex;
use crate::inventory::{self, Inventory};
use crate::page::{Linker, PageState};
use crate::registry::Registry;
use crate::vcs::Git;

/// Stylesheet written next to the site's pages.
const STYLESHEET_CSS: &str = include_str!("../assets/clickable-code.css");

/// Everything loaded once per build and shared by every page.
#[derive(Debug)]
pub struct Project {
    /// Build configuration.
    pub config: Config,
    /// Library symbols from the configured source roots.
    pub index: SymbolIndex,
    /// Plugin registry.
    pub registry: Registry,
    /// Commit, repository URL and root.
    pub state: PageState,
}

impl Project {
    /// Load config, index sources, assemble the registry and query git.
    ///
    /// # Errors
    ///
    /// Returns any configuration, indexing or registry discovery error.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let config = Config::load(root)?;
        let index = SymbolIndex::build(&config.sources)?;
        let registry = Registry::build(&config.registry)?;
        let state = PageState::discover(&config, &Git::new(root));
        return Ok(Self {
            config,
            index,
            registry,
            state,
        });
    }

    /// URL map for pages of `site_dir`, or only the configured links when no
    /// site is given.
    ///
    /// # Errors
    ///
    /// Returns `Error::SiteNotFound` or `Error::Io` from scanning the site.
    pub fn inventory(&self, site_dir: Option<&Path>) -> Result<Inventory, Error> {
        let Some(site_dir) = site_dir else {
            return Ok(Inventory::from_links(&self.config.links));
        };
        let mut inventory = Inventory::scan_site(site_dir)?;
        inventory.extend(&self.config.links);
        return Ok(inventory);
    }
}

/// Outcome of a site build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    /// Pages whose content changed.
    pub changed: usize,
    /// Names with a documentation URL.
    pub documented: usize,
    /// Pages processed.
    pub pages: usize,
}

/// Rewrite every HTML page of `site_dir` in place and write the stylesheet.
///
/// # Errors
///
/// Returns `Error::SiteNotFound` if `site_dir` does not exist, the first
/// page-level fatal error (such as `Error::MissingRepoUrl`), or `Error::Io`.
pub fn build_site(project: &Project, site_dir: &Path) -> Result<BuildSummary, Error> {
    let inventory = project.inventory(Some(site_dir))?;
    if inventory.is_empty() {
        log::warn!("no documentation anchors found in {}", site_dir.display());
    }
    let linker = Linker::new(
        &project.config,
        &project.index,
        &inventory,
        &project.registry,
        &project.state,
    )?;

    let pages = html_pages(site_dir);
    let changed = pages
        .par_iter()
        .map(|page| return process_file(&linker, site_dir, page))
        .collect::<Result<Vec<bool>, Error>>()?
        .into_iter()
        .filter(|changed| return *changed)
        .count();

    if project.config.extra_css.iter().any(|css| return css == STYLESHEET) {
        std::fs::write(site_dir.join(STYLESHEET), STYLESHEET_CSS)?;
    }

    return Ok(BuildSummary {
        changed,
        documented: inventory.len(),
        pages: pages.len(),
    });
}

/// Rewrite one page file. Returns whether it changed.
fn process_file(linker: &Linker<'_>, site_dir: &Path, page: &Path) -> Result<bool, Error> {
    let Some(url) = inventory::page_url(site_dir, page) else {
        log::debug!("skipping {}: not under the site directory", page.display());
        return Ok(false);
    };
    let html = std::fs::read_to_string(page)?;
    let output = linker.process_page(&html, &url)?;
    if output == html {
        return Ok(false);
    }
    std::fs::write(page, output)?;
    log::info!("linked {url}");
    return Ok(true);
}

/// HTML pages under `site_dir`, in path order.
fn html_pages(site_dir: &Path) -> Vec<PathBuf> {
    return WalkDir::new(site_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| return e.file_type().is_file() && inventory::is_html(e.path()))
        .map(walkdir::DirEntry::into_path)
        .collect();
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests")]
mod tests {
    use super::*;
    use crate::index::tests::demo_index;

    fn project(root: &Path) -> Project {
        let config = Config::from_toml(root, "repo_url = \"https://example.com/org/repo\"").unwrap();
        Project {
            registry: Registry::default(),
            state: PageState {
                commit: "abcd123".to_string(),
                repo_url: config.repo_url.clone(),
                root: PathBuf::from("/work"),
            },
            index: demo_index(),
            config,
        }
    }

    #[test]
    fn builds_site_in_place() {
        let site = tempfile::tempdir().unwrap();
        let reference = site.path().join("reference");
        std::fs::create_dir_all(&reference).unwrap();
        std::fs::write(
            reference.join("index.html"),
            "<h2 id=\"demo_package.math.add\">add</h2>\n<h2 id=\"demo_package.math.MovingAverage\">MovingAverage</h2>\n",
        )
        .unwrap();
        std::fs::write(
            site.path().join("index.html"),
            "<pre><code>from demo_package import MovingAverage\nMovingAverage()\n</code></pre>\n",
        )
        .unwrap();
        std::fs::write(site.path().join("plain.html"), "<p>nothing here</p>").unwrap();

        let project = project(site.path());
        let summary = build_site(&project, site.path()).unwrap();
        assert_eq!(summary.pages, 3);
        assert_eq!(summary.changed, 2);
        assert_eq!(summary.documented, 2);

        let home = std::fs::read_to_string(site.path().join("index.html")).unwrap();
        assert!(home.contains("href=\"reference/#demo_package.math.MovingAverage\">MovingAverage</a>"));
        let reference_page = std::fs::read_to_string(reference.join("index.html")).unwrap();
        assert!(reference_page.contains("/blob/abcd123/demo_package/math.py#L6"));
        assert!(site.path().join(STYLESHEET).is_file());

        let again = build_site(&project, site.path()).unwrap();
        assert_eq!(again.changed, 0);
    }

    #[test]
    fn missing_site_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(dir.path());
        let err = build_site(&project, &dir.path().join("site")).unwrap_err();
        assert!(matches!(err, Error::SiteNotFound { .. }));
    }
}
