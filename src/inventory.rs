//! Mapping from fully qualified names to documentation URLs.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use walkdir::WalkDir;

use crate::error::Error;
use crate::grammar::is_dotted_identifier;
use crate::types::LinkTarget;

/// `id="…"` or `id='…'` attributes inside a tag.
static ID_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r#"<[a-zA-Z][^>]*?\sid=(?:"([^"]*)"|'([^']*)')"#).expect("valid regex");
});

/// Answers "where is the documentation for this name?". Queried from many
/// pages at once, never mutated while pages are processed.
pub trait LinkResolver: Sync {
    /// Documentation URL for `full_name`, or `None` to leave it unlinked.
    fn url_for(&self, full_name: &str) -> Option<String>;

    /// [`LinkResolver::url_for`] paired with the name it answers for.
    fn target(&self, full_name: &str) -> Option<LinkTarget> {
        return self.url_for(full_name).map(|url| {
            return LinkTarget {
                full_name: full_name.to_string(),
                url,
            };
        });
    }
}

/// URL map built from the anchors of an already rendered site plus explicit
/// entries from configuration.
#[derive(Debug, Default, Clone)]
pub struct Inventory {
    /// full name → absolute URL path.
    urls: BTreeMap<String, String>,
}

impl Inventory {
    /// Build an inventory holding only explicit entries.
    pub fn from_links(links: &BTreeMap<String, String>) -> Self {
        return Self { urls: links.clone() };
    }

    /// Collect dotted-identifier element ids across every page of `site_dir`
    /// and map each to `/page/#id`. The first page (in path order) declaring
    /// an id wins.
    ///
    /// # Errors
    ///
    /// Returns `Error::SiteNotFound` if `site_dir` is not a directory, or
    /// `Error::Io` if a page cannot be read.
    pub fn scan_site(site_dir: &Path) -> Result<Self, Error> {
        if !site_dir.is_dir() {
            return Err(Error::SiteNotFound {
                path: site_dir.to_path_buf(),
            });
        }

        let mut inventory = Self::default();
        let pages = WalkDir::new(site_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| return e.file_type().is_file() && is_html(e.path()));

        for page in pages {
            let Some(url) = page_url(site_dir, page.path()) else {
                continue;
            };
            let html = std::fs::read_to_string(page.path())?;
            inventory.add_page(&url, &html);
        }
        log::info!("inventory: {} documented names", inventory.urls.len());
        return Ok(inventory);
    }

    /// Record every dotted-identifier id of one page served at `url`.
    pub fn add_page(&mut self, url: &str, html: &str) {
        for caps in ID_ATTRIBUTE.captures_iter(html) {
            let Some(id) = caps.get(1).or_else(|| return caps.get(2)).map(|m| return m.as_str()) else {
                continue;
            };
            if !is_dotted_identifier(id) {
                continue;
            }
            self.urls.entry(id.to_string()).or_insert_with(|| return format!("{url}#{id}"));
        }
    }

    /// Layer explicit entries over the scanned ones.
    pub fn extend(&mut self, links: &BTreeMap<String, String>) {
        for (name, url) in links {
            self.urls.insert(name.clone(), url.clone());
        }
    }

    /// Number of known names.
    pub fn len(&self) -> usize {
        return self.urls.len();
    }

    /// Whether no names are known.
    pub fn is_empty(&self) -> bool {
        return self.urls.is_empty();
    }
}

impl LinkResolver for Inventory {
    fn url_for(&self, full_name: &str) -> Option<String> {
        return self.urls.get(full_name).cloned();
    }
}

/// Whether a path names an HTML page.
pub fn is_html(path: &Path) -> bool {
    return path
        .extension()
        .and_then(|e| return e.to_str())
        .is_some_and(|e| return e.eq_ignore_ascii_case("html"));
}

/// Absolute URL path a page is served at: `index.html` maps to its
/// directory (`/a/b/`), other files to themselves (`/a/b.html`).
pub fn page_url(site_dir: &Path, page: &Path) -> Option<String> {
    let relative = page.strip_prefix(site_dir).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| return c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    let (file, dirs) = parts.split_last()?;
    let mut url = String::from("/");
    for dir in dirs {
        url.push_str(dir);
        url.push('/');
    }
    if *file != "index.html" {
        url.push_str(file);
    }
    return Some(url);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests")]
mod tests {
    use super::*;

    #[test]
    fn collects_dotted_ids_with_page_urls() {
        let mut inventory = Inventory::default();
        assert!(inventory.is_empty());
        inventory.add_page(
            "/reference/math/",
            "<h2 id=\"demo_package.math.add\">add</h2><div class='doc' id='demo_package.math'></div>\
             <h2 id=\"usage--notes\">Usage</h2><h3 id=\"installation\">x</h3>",
        );
        assert_eq!(
            inventory.url_for("demo_package.math.add").as_deref(),
            Some("/reference/math/#demo_package.math.add")
        );
        assert_eq!(inventory.url_for("demo_package.math").as_deref(), Some("/reference/math/#demo_package.math"));
        assert!(inventory.url_for("usage--notes").is_none());
        assert_eq!(inventory.len(), 3);
    }

    #[test]
    fn explicit_links_override_scanned_ones() {
        let mut inventory = Inventory::default();
        inventory.add_page("/a/", "<h2 id=\"pkg.f\">f</h2>");
        inventory.extend(&BTreeMap::from([("pkg.f".to_string(), "/b/#pkg.f".to_string())]));
        assert_eq!(inventory.url_for("pkg.f").as_deref(), Some("/b/#pkg.f"));
        assert_eq!(
            inventory.target("pkg.f"),
            Some(LinkTarget {
                full_name: "pkg.f".to_string(),
                url: "/b/#pkg.f".to_string(),
            })
        );
    }

    #[test]
    fn page_urls_follow_directory_style() {
        let site = Path::new("/site");
        assert_eq!(page_url(site, Path::new("/site/index.html")).as_deref(), Some("/"));
        assert_eq!(page_url(site, Path::new("/site/a/b/index.html")).as_deref(), Some("/a/b/"));
        assert_eq!(page_url(site, Path::new("/site/a/404.html")).as_deref(), Some("/a/404.html"));
        assert!(page_url(site, Path::new("/elsewhere/x.html")).is_none());
    }

    #[test]
    fn missing_site_is_an_error() {
        let err = Inventory::scan_site(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, Error::SiteNotFound { .. }));
    }
}
