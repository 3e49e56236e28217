//! Regex passes over serialized page HTML: qualified names, registry
//! key/value pairs and absolute link attributes.
//!
//! Each pass copies the page verbatim except for the exact byte ranges it
//! substitutes. Matches inside a tag or inside an existing `<a>` element are
//! left alone so running a pass twice changes nothing.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use relative_path::RelativePath;

use crate::config::Config;
use crate::error::Error;
use crate::inventory::LinkResolver;
use crate::registry::{FACTORIES, Registry};

/// Class on anchors that must not look like ordinary links.
pub const DISCRETE_LINK_CLASS: &str = "clickable-discrete-link";

/// Characters that may continue a qualified name on either side.
const NAME_CHARS: &str = "a-zA-Z0-9._-";

/// Highlighted `"@group": "name"` pair. Quotes may be raw or entity encoded.
static REGISTRY_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    let quote = r#"(?:"|&#39;|&quot;)"#;
    let pattern = format!(
        r"<span[^>]*>{quote}@([{NAME_CHARS}]*){quote}</span>\s*<span[^>]*>:</span>\s*(?:<span[^>]*>\s*</span>\s*)?<span[^>]*>{quote}?([{NAME_CHARS}]*){quote}?</span>"
    );
    return Regex::new(&pattern).expect("valid regex");
});

/// `href` on `<a>` or `src` on `<img>`, with the value in one of three
/// quoting styles.
static LINK_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(
        r#"<\s*(?:a\b[^>]*?\bhref|img\b[^>]*?\bsrc)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#,
    )
    .expect("valid regex");
});

/// Compiled qualified-name patterns and the lookback rule shared by the
/// qualified-name and registry passes.
#[derive(Debug)]
pub struct Rewriter {
    /// Marker that suppresses a match when found in the lookback window.
    default_marker: String,
    /// `<span>PREFIX</span><span>.</span><span>NAME</span>`.
    highlighted: Regex,
    /// Bytes before a match searched for `default_marker`.
    lookback: usize,
    /// `PREFIX.NAME` in plain text.
    plain: Regex,
    /// Qualified-name prefix, e.g. `eds`.
    prefix: String,
}

impl Rewriter {
    /// Compile the qualified-name patterns for the configured prefix.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if the prefix yields an invalid regex.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let prefix = regex::escape(&config.qualified_prefix);
        let compile = |pattern: String| {
            return Regex::new(&pattern).map_err(|e| {
                return Error::InvalidPattern {
                    pattern: config.qualified_prefix.clone(),
                    reason: e.to_string(),
                    setting: "qualified_prefix",
                };
            });
        };
        return Ok(Self {
            default_marker: config.default_marker.clone(),
            highlighted: compile(format!(
                r"<span[^>]*>{prefix}</span><span[^>]*>\.</span><span[^>]*>([{NAME_CHARS}]+)</span>"
            ))?,
            lookback: config.lookback,
            plain: compile(format!(r"{prefix}\.([{NAME_CHARS}]+)"))?,
            prefix: config.qualified_prefix.clone(),
        });
    }

    /// Replace `PREFIX.NAME`, plain or highlighted, with a link to the
    /// documentation of the factory registered under that name.
    pub fn qualified_names(&self, html: &str, registry: &Registry, links: &dyn LinkResolver) -> String {
        let plain = self.substitute(&self.plain, html, |caps| return self.link_factory(caps, registry, links));
        return self.substitute(&self.highlighted, &plain, |caps| {
            return self.link_factory(caps, registry, links);
        });
    }

    /// Wrap the value of highlighted `"@group": "name"` pairs in a discrete
    /// link when `name` is registered in `group`.
    pub fn registry_values(&self, html: &str, registry: &Registry, links: &dyn LinkResolver) -> String {
        return self.substitute(&REGISTRY_PAIR, html, |caps| {
            let (whole, group, name) = (caps.get(0)?, caps.get(1)?, caps.get(2)?);
            if name.as_str().is_empty() {
                return None;
            }
            let target = registry.target_name(group.as_str(), name.as_str())?;
            let url = links.url_for(&target)?;
            let start = whole.start();
            let before = html_slice(whole.as_str(), 0, name.start().saturating_sub(start))?;
            let after = html_slice(whole.as_str(), name.end().saturating_sub(start), whole.len())?;
            return Some(format!(
                "{before}<a href=\"{url}\" class=\"{DISCRETE_LINK_CLASS}\">{}</a>{after}",
                name.as_str()
            ));
        });
    }

    /// Replacement for one qualified-name match, if its factory has a page.
    fn link_factory(&self, caps: &Captures<'_>, registry: &Registry, links: &dyn LinkResolver) -> Option<String> {
        let name = format!("{}.{}", self.prefix, caps.get(1)?.as_str());
        let target = links.target(&registry.target_name(FACTORIES, &name)?)?;
        log::debug!("linking `{name}` to `{}` at {}", target.full_name, target.url);
        return Some(format!("<a href=\"{}\">{name}</a>", target.url));
    }

    /// Copy `html`, replacing each bounded, unguarded match for which
    /// `replace` returns `Some`.
    fn substitute<F>(&self, pattern: &Regex, html: &str, replace: F) -> String
    where
        F: Fn(&Captures<'_>) -> Option<String>,
    {
        let mut out = String::with_capacity(html.len());
        let mut copied = 0usize;
        for caps in bounded_matches(pattern, html) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if is_guarded(html, whole.start()) || self.has_default_marker(html, whole.start()) {
                continue;
            }
            let Some(replacement) = replace(&caps) else {
                continue;
            };
            out.push_str(html.get(copied..whole.start()).unwrap_or_default());
            out.push_str(&replacement);
            copied = whole.end();
        }
        out.push_str(html.get(copied..).unwrap_or_default());
        return out;
    }

    /// Whether the lookback window before `start` contains the default marker.
    fn has_default_marker(&self, html: &str, start: usize) -> bool {
        let mut from = start.saturating_sub(self.lookback);
        while !html.is_char_boundary(from) {
            from = from.saturating_add(1);
        }
        return html
            .get(from..start)
            .is_some_and(|window| return window.contains(self.default_marker.as_str()));
    }
}

/// Rewrite absolute `href`/`src` values relative to the page at `page_url`.
/// Other values, quoting, query and fragment are kept as written.
pub fn relative_links(html: &str, page_url: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut copied = 0usize;
    for caps in LINK_ATTRIBUTE.captures_iter(html) {
        let Some(value) = caps.get(1).or_else(|| return caps.get(2)).or_else(|| return caps.get(3)) else {
            continue;
        };
        let url = value.as_str();
        if !url.starts_with('/') || url.starts_with("//") {
            continue;
        }
        out.push_str(html.get(copied..value.start()).unwrap_or_default());
        out.push_str(&relative_url(url, page_url));
        copied = value.end();
    }
    out.push_str(html.get(copied..).unwrap_or_default());
    return out;
}

/// Express the absolute URL path `target` relative to the directory of the
/// page served at `page_url`.
pub fn relative_url(target: &str, page_url: &str) -> String {
    let split = target.find(['?', '#']).unwrap_or(target.len());
    let (path, suffix) = target.split_at(split);

    let page_dir = page_url.rfind('/').map_or("", |i| return &page_url[..i]);
    let from = RelativePath::new(page_dir.trim_start_matches('/'));
    let relative = from.relative(path.trim_start_matches('/'));

    let mut result = relative.as_str().to_string();
    if result.is_empty() {
        result.push('.');
    }
    if path.ends_with('/') && !result.ends_with('/') {
        result.push('/');
    }
    result.push_str(suffix);
    return result;
}

/// Matches of `pattern` with no name character directly before or after.
/// A rejected match is retried one character further on.
fn bounded_matches<'h>(pattern: &Regex, html: &'h str) -> Vec<Captures<'h>> {
    let mut found = Vec::new();
    let mut at = 0usize;
    while at <= html.len() {
        let Some(caps) = pattern.captures_at(html, at) else {
            break;
        };
        let Some(whole) = caps.get(0) else {
            break;
        };
        let (start, end) = (whole.start(), whole.end());
        if is_name_char(html[..start].chars().next_back()) || is_name_char(html[end..].chars().next()) {
            at = start.saturating_add(html[start..].chars().next().map_or(1, char::len_utf8));
            continue;
        }
        at = if end > start { end } else { end.saturating_add(1) };
        found.push(caps);
    }
    return found;
}

/// Whether `c` may continue a qualified name.
fn is_name_char(c: Option<char>) -> bool {
    return c.is_some_and(|c| return c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
}

/// Whether byte `start` sits inside a tag or inside an open `<a>` element.
fn is_guarded(html: &str, start: usize) -> bool {
    let before = html.get(..start).unwrap_or_default();
    let inside_tag = match (before.rfind('<'), before.rfind('>')) {
        (Some(open), Some(close)) => open > close,
        (Some(_), None) => true,
        (None, _) => false,
    };
    if inside_tag {
        return true;
    }
    let last_open = [before.rfind("<a "), before.rfind("<a>"), before.rfind("<a\n")]
        .into_iter()
        .flatten()
        .max();
    let last_close = before.rfind("</a>");
    return match (last_open, last_close) {
        (Some(open), Some(close)) => open > close,
        (Some(_), None) => true,
        (None, _) => false,
    };
}

/// Sub-slice of a match, `None` off a character boundary.
fn html_slice(text: &str, from: usize, to: usize) -> Option<&str> {
    return text.get(from..to);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests")]
mod tests {
    use std::collections::BTreeMap;
    use std::path::Path;

    use super::*;
    use crate::config::RegistryConfig;
    use crate::inventory::Inventory;

    fn fixtures() -> (Rewriter, Registry, Inventory) {
        let config = Config::from_toml(Path::new("."), "").unwrap();
        let mut registry_config = RegistryConfig::default();
        registry_config.groups.insert(
            "factories".to_string(),
            BTreeMap::from([("eds.average".to_string(), "demo_package.math:MovingAverage".to_string())]),
        );
        registry_config.groups.insert(
            "misc".to_string(),
            BTreeMap::from([("my_component".to_string(), "demo_package.math:add".to_string())]),
        );
        let registry = Registry::build(&registry_config).unwrap();
        let inventory = Inventory::from_links(&BTreeMap::from([
            ("demo_package.math.MovingAverage".to_string(), "/reference/math/#MovingAverage".to_string()),
            ("demo_package.math.add".to_string(), "/reference/math/#add".to_string()),
        ]));
        (Rewriter::new(&config).unwrap(), registry, inventory)
    }

    #[test]
    fn links_plain_qualified_names() {
        let (rewriter, registry, inventory) = fixtures();
        let html = "<p>Use eds.average or eds.unknown, not xeds.average.</p>";
        assert_eq!(
            rewriter.qualified_names(html, &registry, &inventory),
            "<p>Use <a href=\"/reference/math/#MovingAverage\">eds.average</a> or eds.unknown, not xeds.average.</p>"
        );
    }

    #[test]
    fn links_highlighted_qualified_names() {
        let (rewriter, registry, inventory) = fixtures();
        let html = "<code><span class=\"n\">eds</span><span class=\"o\">.</span><span class=\"n\">average</span>()</code>";
        assert_eq!(
            rewriter.qualified_names(html, &registry, &inventory),
            "<code><a href=\"/reference/math/#MovingAverage\">eds.average</a>()</code>"
        );
    }

    #[test]
    fn default_marker_suppresses_links() {
        let (rewriter, registry, inventory) = fixtures();
        let html = "<td>DEFAULT: <code>eds.average</code></td>";
        assert_eq!(rewriter.qualified_names(html, &registry, &inventory), html);
    }

    #[test]
    fn default_marker_applies_to_registry_values() {
        let (rewriter, registry, inventory) = fixtures();
        let pair = "<span class=\"s2\">&quot;@factories&quot;</span><span class=\"p\">:</span><span class=\"w\"> </span>\
                    <span class=\"s2\">&quot;eds.average&quot;</span>";

        let marked = format!("<td>DEFAULT: {pair}</td>");
        assert_eq!(rewriter.registry_values(&marked, &registry, &inventory), marked);

        let distant = format!("<td>DEFAULT:</td>{}{pair}", " ".repeat(50));
        let linked = rewriter.registry_values(&distant, &registry, &inventory);
        assert!(linked.contains(
            "&quot;<a href=\"/reference/math/#MovingAverage\" class=\"clickable-discrete-link\">eds.average</a>&quot;"
        ));
    }

    #[test]
    fn guarded_matches_are_untouched() {
        let (rewriter, registry, inventory) = fixtures();
        let html = "<p title=\"eds.average\"><a href=\"/x/\">see eds.average</a></p>";
        assert_eq!(rewriter.qualified_names(html, &registry, &inventory), html);

        let once = rewriter.qualified_names("<p>eds.average</p>", &registry, &inventory);
        assert_eq!(rewriter.qualified_names(&once, &registry, &inventory), once);
    }

    #[test]
    fn registry_pass_wraps_only_the_value() {
        let (rewriter, registry, inventory) = fixtures();
        let html = "<span class=\"s2\">&quot;@misc&quot;</span><span class=\"p\">:</span><span class=\"w\"> </span>\
                    <span class=\"s2\">&quot;my_component&quot;</span>";
        let expected = "<span class=\"s2\">&quot;@misc&quot;</span><span class=\"p\">:</span><span class=\"w\"> </span>\
                        <span class=\"s2\">&quot;<a href=\"/reference/math/#add\" class=\"clickable-discrete-link\">my_component</a>&quot;</span>";
        let once = rewriter.registry_values(html, &registry, &inventory);
        assert_eq!(once, expected);
        assert_eq!(rewriter.registry_values(&once, &registry, &inventory), once);
    }

    #[test]
    fn registry_pass_leaves_unknown_pairs() {
        let (rewriter, registry, inventory) = fixtures();
        let html = "<span>\"@misc\"</span><span>:</span> <span>\"nothing\"</span>";
        assert_eq!(rewriter.registry_values(html, &registry, &inventory), html);
    }

    #[test]
    fn relative_url_from_page_directory() {
        assert_eq!(relative_url("/a/c/page.html", "/a/b/index.html"), "../c/page.html");
        assert_eq!(relative_url("/a/c/", "/a/b/"), "../c/");
        assert_eq!(relative_url("/a/b/", "/a/b/"), "./");
        assert_eq!(relative_url("/assets/x.css?v=1#top", "/"), "assets/x.css?v=1#top");
    }

    #[test]
    fn relative_links_keep_quoting_and_skip_non_absolute() {
        let html = "<a class=\"x\" href=\"/a/c/page.html#s\">c</a><img src='/img/logo.png'><a href=/a/b/>b</a>\
                    <a href=\"https://example.com/\">e</a><a href=\"//cdn/x\">x</a><a href=\"#top\">t</a>";
        let expected = "<a class=\"x\" href=\"../c/page.html#s\">c</a><img src='../../img/logo.png'><a href=./>b</a>\
                        <a href=\"https://example.com/\">e</a><a href=\"//cdn/x\">x</a><a href=\"#top\">t</a>";
        let once = relative_links(html, "/a/b/index.html");
        assert_eq!(once, expected);
        assert_eq!(relative_links(&once, "/a/b/index.html"), once);
    }

    #[test]
    fn passes_without_matches_are_byte_identical() {
        let (rewriter, registry, inventory) = fixtures();
        let html = "<div class=\"md\">\n  <p>Plain  text &amp; <em>markup</em></p>\n</div>";
        assert_eq!(rewriter.qualified_names(html, &registry, &inventory), html);
        assert_eq!(rewriter.registry_values(html, &registry, &inventory), html);
        assert_eq!(relative_links(html, "/"), html);
    }
}
