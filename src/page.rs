//! Per-page orchestration of every link pass.

use std::path::PathBuf;

use crate::codeblocks::BlockLinker;
use crate::config::Config;
use crate::error::Error;
use crate::headings::HeadingLinker;
use crate::index::SymbolIndex;
use crate::inventory::LinkResolver;
use crate::registry::Registry;
use crate::rewrite::{self, Rewriter};
use crate::vcs::{Vcs, normalize_repo_url};

/// Commit used when the VCS cannot name one.
const DEFAULT_COMMIT: &str = "main";

/// Build-wide facts every page reads. Built once, then shared by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    /// Short commit hash source links are pinned to.
    pub commit: String,
    /// Normalized repository web URL, if known.
    pub repo_url: Option<String>,
    /// Working directory root; source paths are made relative to it.
    pub root: PathBuf,
}

impl PageState {
    /// Gather commit and repository URL. A configured `repo_url` wins over
    /// the `origin` remote. VCS failures degrade to defaults.
    pub fn discover(config: &Config, vcs: &dyn Vcs) -> Self {
        let commit = vcs.current_commit().unwrap_or_else(|| {
            log::warn!("could not determine the current commit, pinning source links to `{DEFAULT_COMMIT}`");
            return DEFAULT_COMMIT.to_string();
        });

        let repo_url = config.repo_url.clone().or_else(|| return vcs.remote_url());
        if repo_url.is_none() {
            log::warn!("no repository URL configured and no `origin` remote found");
        }

        let root = config.root.canonicalize().unwrap_or_else(|_| return config.root.clone());
        if let Some(repo_root) = vcs.repo_root().filter(|r| return *r != root) {
            log::warn!(
                "source paths are relative to {}, but the repository root is {}",
                config.root.display(),
                repo_root.display()
            );
        }

        return Self {
            commit,
            repo_url: repo_url.as_deref().map(normalize_repo_url),
            root: config.root.clone(),
        };
    }
}

/// Every pass over one page, wired to the shared build state.
pub struct Linker<'a> {
    /// Build configuration.
    config: &'a Config,
    /// Library symbols.
    index: &'a SymbolIndex,
    /// Documentation URLs.
    links: &'a dyn LinkResolver,
    /// Plugin registry.
    registry: &'a Registry,
    /// Compiled qualified-name patterns.
    rewriter: Rewriter,
    /// Commit, repository URL and root.
    state: &'a PageState,
}

impl<'a> Linker<'a> {
    /// Wire the passes together.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if the qualified-name patterns do not
    /// compile.
    pub fn new(
        config: &'a Config,
        index: &'a SymbolIndex,
        links: &'a dyn LinkResolver,
        registry: &'a Registry,
        state: &'a PageState,
    ) -> Result<Self, Error> {
        return Ok(Self {
            config,
            index,
            links,
            registry,
            rewriter: Rewriter::new(config)?,
            state,
        });
    }

    /// Rewrite one page served at `page_url`: qualified names, registry
    /// values, code blocks, relative links, then headings.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingRepoUrl` if a heading resolves without a
    /// repository URL, or `Error::Io` if a code block cannot be serialized.
    pub fn process_page(&self, html: &str, page_url: &str) -> Result<String, Error> {
        let html = self.rewriter.qualified_names(html, self.registry, self.links);
        let html = self.rewriter.registry_values(&html, self.registry, self.links);

        let blocks = BlockLinker {
            annotation_class: &self.config.annotation_class,
            index: self.index,
            links: self.links,
            namespace: self.config.namespace.as_deref(),
        };
        let html = blocks.link_page(&html)?;

        let html = rewrite::relative_links(&html, page_url);

        let headings = HeadingLinker {
            index: self.index,
            pattern: self.config.pattern.as_ref(),
            state: self.state,
        };
        return headings.link_page(&html);
    }
}
