//! Append "[source]" links to headings whose id names a library symbol.

use std::path::{Component, Path};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Error;
use crate::grammar::is_dotted_identifier;
use crate::index::SymbolIndex;
use crate::page::PageState;
use crate::resolver::Script;

/// Class added to headings that received a source link.
pub const SOURCED_CLASS: &str = "sourced-heading";

/// Opening heading tag; group 1 is the level, group 2 the attribute list.
static HEADING_OPEN: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"<h([1-6])(\s[^>]*)?>").expect("valid regex"));

/// `id` attribute in any quoting style.
static ID_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r#"\sid\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).expect("valid regex");
});

/// `class` attribute in any quoting style; group 3 is an unquoted value.
static CLASS_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r#"\sclass\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).expect("valid regex");
});

/// Why a heading is left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The heading already carries [`SOURCED_CLASS`].
    AlreadySourced,
    /// The id contains `--`.
    DoubleDash,
    /// The heading has no `id`.
    NoId,
    /// The id has no `.`.
    NotDotted,
    /// The id is not a dotted identifier path.
    NotIdentifierPath,
    /// The id does not match the configured pattern.
    PatternMismatch,
}

/// What to do with one heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadingDecision {
    /// Try to resolve the id to a definition.
    Resolve,
    /// Leave the heading unmodified.
    Skip(SkipReason),
}

/// Decide whether a heading with `id` and `classes` is worth resolving.
pub fn decide(id: Option<&str>, classes: &str, pattern: Option<&Regex>) -> HeadingDecision {
    let Some(id) = id else {
        return HeadingDecision::Skip(SkipReason::NoId);
    };
    if pattern.is_some_and(|p| return !p.is_match(id)) {
        return HeadingDecision::Skip(SkipReason::PatternMismatch);
    }
    if id.contains("--") {
        return HeadingDecision::Skip(SkipReason::DoubleDash);
    }
    if !id.contains('.') {
        return HeadingDecision::Skip(SkipReason::NotDotted);
    }
    if !is_dotted_identifier(id) {
        return HeadingDecision::Skip(SkipReason::NotIdentifierPath);
    }
    if classes.split_whitespace().any(|c| return c == SOURCED_CLASS) {
        return HeadingDecision::Skip(SkipReason::AlreadySourced);
    }
    return HeadingDecision::Resolve;
}

/// Heading pass over one page.
pub struct HeadingLinker<'a> {
    /// Library symbols.
    pub index: &'a SymbolIndex,
    /// Heading-id inclusion pattern.
    pub pattern: Option<&'a Regex>,
    /// Commit, repository URL and root shared by all pages.
    pub state: &'a PageState,
}

impl HeadingLinker<'_> {
    /// Append a source link to every heading that resolves.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingRepoUrl` if a heading resolves while no
    /// repository URL is known.
    pub fn link_page(&self, html: &str) -> Result<String, Error> {
        let mut out = String::with_capacity(html.len());
        let mut copied = 0usize;

        for caps in HEADING_OPEN.captures_iter(html) {
            let (Some(open), Some(level)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if open.start() < copied {
                continue;
            }
            let closing = format!("</h{}>", level.as_str());
            let Some(close) = html.get(open.end()..).and_then(|rest| return rest.find(&closing)) else {
                continue;
            };
            let close = open.end().saturating_add(close);

            let attributes = caps.get(2).map_or("", |m| return m.as_str());
            let id = attribute_value(&ID_ATTRIBUTE, attributes);
            let classes = attribute_value(&CLASS_ATTRIBUTE, attributes).unwrap_or_default();

            match decide(id, classes, self.pattern) {
                HeadingDecision::Skip(reason) => {
                    log::debug!("heading {id:?} skipped: {reason:?}");
                    continue;
                },
                HeadingDecision::Resolve => {},
            }
            let Some(id) = id else {
                continue;
            };
            let Some(url) = self.source_url_for(id)? else {
                continue;
            };

            out.push_str(html.get(copied..open.start()).unwrap_or_default());
            out.push_str(&with_class(open.as_str(), SOURCED_CLASS));
            out.push_str(html.get(open.end()..close).unwrap_or_default());
            out.push_str(&format!(
                "<span class=\"sourced-heading-spacer\"></span><a href=\"{url}\" target=\"_blank\">[source]</a>"
            ));
            copied = close;
        }
        out.push_str(html.get(copied..).unwrap_or_default());
        return Ok(out);
    }

    /// Resolve a heading id to its pinned source URL. A miss is `Ok(None)`.
    fn source_url_for(&self, id: &str) -> Result<Option<String>, Error> {
        let first = id.split('.').next().unwrap_or(id);
        let snippet = format!("import {first}; {id}");
        let definitions = match Script::new(self.index, &snippet).and_then(|s| return s.infer(1, snippet.len())) {
            Ok(definitions) => definitions,
            Err(e) => {
                log::debug!("heading `{id}` unresolved: {e}");
                return Ok(None);
            },
        };

        let located = definitions.iter().find_map(|d| return Some((d.path.as_deref()?, d.line?)));
        let Some((path, line)) = located else {
            log::debug!("heading `{id}` has no source location");
            return Ok(None);
        };
        let Some(relative) = relative_to_root(path, &self.state.root) else {
            log::debug!("heading `{id}` defined outside {}", self.state.root.display());
            return Ok(None);
        };
        let Some(repo_url) = self.state.repo_url.as_deref() else {
            return Err(Error::MissingRepoUrl { heading: id.to_string() });
        };
        return Ok(Some(source_url(repo_url, &self.state.commit, &relative, line)));
    }
}

/// `{repo_url}/blob/{commit}/{path}#L{line}` with no doubled slash.
pub fn source_url(repo_url: &str, commit: &str, relative_path: &str, line: u32) -> String {
    return format!("{}/blob/{commit}/{relative_path}#L{line}", repo_url.trim_end_matches('/'));
}

/// `path` relative to `root`, with `/` separators. `None` outside `root`.
fn relative_to_root(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {},
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    return (!parts.is_empty()).then(|| return parts.join("/"));
}

/// Value of the first attribute matched by `pattern`.
fn attribute_value<'h>(pattern: &Regex, attributes: &'h str) -> Option<&'h str> {
    let caps = pattern.captures(attributes)?;
    return (1..caps.len()).find_map(|i| return caps.get(i)).map(|m| return m.as_str());
}

/// Opening tag with `class` added, keeping every other byte.
fn with_class(open_tag: &str, class: &str) -> String {
    let caps = CLASS_ATTRIBUTE.captures(open_tag);
    let quoted = caps.as_ref().and_then(|c| return c.get(1).or_else(|| return c.get(2)));
    if let Some(value) = quoted {
        let separator = if value.as_str().trim().is_empty() { "" } else { " " };
        return format!(
            "{}{separator}{class}{}",
            &open_tag[..value.end()],
            &open_tag[value.end()..]
        );
    }
    // An unquoted value cannot hold a second class, so it gets quoted.
    if let Some(bare) = caps.as_ref().and_then(|c| return c.get(3)) {
        return format!(
            "{}\"{} {class}\"{}",
            &open_tag[..bare.start()],
            bare.as_str(),
            &open_tag[bare.end()..]
        );
    }
    let insert_at = open_tag.len().saturating_sub(1);
    return format!("{} class=\"{class}\">", &open_tag[..insert_at]);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests")]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::index::tests::demo_index;

    fn state(repo_url: Option<&str>) -> PageState {
        PageState {
            commit: "abcd123".to_string(),
            repo_url: repo_url.map(String::from),
            root: PathBuf::from("/work"),
        }
    }

    #[test]
    fn decisions_follow_skip_rules() {
        let pattern = Regex::new("^(?:demo_package)").unwrap();
        let p = Some(&pattern);
        assert_eq!(decide(None, "", p), HeadingDecision::Skip(SkipReason::NoId));
        assert_eq!(decide(Some("usage"), "", p), HeadingDecision::Skip(SkipReason::PatternMismatch));
        assert_eq!(decide(Some("demo_package--x.y"), "", p), HeadingDecision::Skip(SkipReason::DoubleDash));
        assert_eq!(decide(Some("demo_package"), "", p), HeadingDecision::Skip(SkipReason::NotDotted));
        assert_eq!(
            decide(Some("demo_package.add(x)"), "", p),
            HeadingDecision::Skip(SkipReason::NotIdentifierPath)
        );
        assert_eq!(
            decide(Some("demo_package.add"), "doc sourced-heading", p),
            HeadingDecision::Skip(SkipReason::AlreadySourced)
        );
        assert_eq!(decide(Some("demo_package.add"), "doc", p), HeadingDecision::Resolve);
        assert_eq!(decide(Some("usage.notes"), "", None), HeadingDecision::Resolve);
    }

    #[test]
    fn builds_pinned_source_url() {
        assert_eq!(
            source_url("https://example.com/org/repo/", "abcd123", "pkg/mod.py", 42),
            "https://example.com/org/repo/blob/abcd123/pkg/mod.py#L42"
        );
        assert_eq!(
            relative_to_root(Path::new("/work/pkg/mod.py"), Path::new("/work")).as_deref(),
            Some("pkg/mod.py")
        );
        assert!(relative_to_root(Path::new("/elsewhere/mod.py"), Path::new("/work")).is_none());
    }

    #[test]
    fn appends_source_link_and_class() {
        let index = demo_index();
        let state = state(Some("https://example.com/org/repo"));
        let linker = HeadingLinker {
            index: &index,
            pattern: None,
            state: &state,
        };
        let html = "<h2 class=\"doc doc-heading\" id=\"demo_package.math.MovingAverage.update\">update</h2>\n\
                    <h2 id=\"installation\">Installation</h2>";
        let out = linker.link_page(html).unwrap();
        assert_eq!(
            out,
            "<h2 class=\"doc doc-heading sourced-heading\" id=\"demo_package.math.MovingAverage.update\">update\
             <span class=\"sourced-heading-spacer\"></span>\
             <a href=\"https://example.com/org/repo/blob/abcd123/demo_package/math.py#L10\" target=\"_blank\">[source]</a></h2>\n\
             <h2 id=\"installation\">Installation</h2>"
        );
        assert_eq!(linker.link_page(&out).unwrap(), out);
    }

    #[test]
    fn heading_without_class_gets_one() {
        let index = demo_index();
        let state = state(Some("https://example.com/org/repo"));
        let linker = HeadingLinker {
            index: &index,
            pattern: None,
            state: &state,
        };
        let out = linker.link_page("<h3 id=\"demo_package.add\">add</h3>").unwrap();
        assert!(out.starts_with("<h3 id=\"demo_package.add\" class=\"sourced-heading\">add"));
        assert!(out.contains("/blob/abcd123/demo_package/math.py#L3"));
    }

    #[test]
    fn unquoted_class_is_extended() {
        let index = demo_index();
        let state = state(Some("https://example.com/org/repo"));
        let linker = HeadingLinker {
            index: &index,
            pattern: None,
            state: &state,
        };
        let out = linker.link_page("<h2 class=doc id=\"demo_package.add\">add</h2>").unwrap();
        assert!(out.starts_with("<h2 class=\"doc sourced-heading\" id=\"demo_package.add\">add"));
        assert_eq!(out.matches("class=").count(), 2);
        assert_eq!(linker.link_page(&out).unwrap(), out);
    }

    #[test]
    fn unresolved_headings_are_untouched() {
        let index = demo_index();
        let state = state(None);
        let linker = HeadingLinker {
            index: &index,
            pattern: None,
            state: &state,
        };
        let html = "<h2 id=\"demo_package.missing\">x</h2><h2 id=\"other.thing\">y</h2>";
        assert_eq!(linker.link_page(html).unwrap(), html);
    }

    #[test]
    fn resolved_heading_without_repo_url_is_fatal() {
        let index = demo_index();
        let state = state(None);
        let linker = HeadingLinker {
            index: &index,
            pattern: None,
            state: &state,
        };
        let err = linker.link_page("<h2 id=\"demo_package.add\">add</h2>").unwrap_err();
        assert!(matches!(err, Error::MissingRepoUrl { ref heading } if heading == "demo_package.add"));
    }
}
