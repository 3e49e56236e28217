//! Link identifiers inside multi-line code blocks to their reference pages.
//!
//! All block code of a page is reconstructed into one source so imports in
//! an early block inform references in later ones. Anchors are written into
//! each block's own DOM, and only blocks that gained an anchor are
//! serialized and spliced back into the page.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::LazyLock;

use kuchiki::{Attribute, ExpandedName, NodeRef};
use markup5ever::{QualName, local_name, namespace_url, ns};
use regex::Regex;

use crate::error::{Error, ResolutionError};
use crate::extract::{CodeFragment, ReconstructedSource};
use crate::index::SymbolIndex;
use crate::inventory::LinkResolver;
use crate::resolver::Script;
use crate::rewrite::DISCRETE_LINK_CLASS;
use crate::types::{Candidate, Definition, LinkTarget};

/// A `<code>` element with its content, attributes allowed.
static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"(?s)<code(?:\s[^>]*)?>.*?</code>").expect("valid regex"));

/// Settings the code-block pass reads from the build configuration.
pub struct BlockLinker<'a> {
    /// Class marking annotation overlays.
    pub annotation_class: &'a str,
    /// Library symbols.
    pub index: &'a SymbolIndex,
    /// Documentation URLs.
    pub links: &'a dyn LinkResolver,
    /// Namespace of interest.
    pub namespace: Option<&'a str>,
}

/// One block taking part in the page analysis.
struct Block {
    /// Whether an anchor was inserted into the block.
    changed: bool,
    /// Parsed DOM of the block.
    fragment: CodeFragment,
    /// Byte span of the `<code>` element in the page.
    span: Range<usize>,
    /// Byte span of the block in the page-global source.
    text: Range<usize>,
}

/// An accepted candidate with the URL it links to.
struct PlannedLink {
    /// Byte length of the identifier.
    len: usize,
    /// Byte offset of the identifier in the page-global source.
    offset: usize,
    /// Documentation page of the accepted definition.
    target: LinkTarget,
}

impl BlockLinker<'_> {
    /// Link every resolvable identifier of the page's block code.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if a changed block cannot be serialized.
    pub fn link_page(&self, html: &str) -> Result<String, Error> {
        let mut blocks = Vec::new();
        let mut source = ReconstructedSource::default();

        for found in CODE_BLOCK.find_iter(html) {
            if !found.as_str().contains('\n') {
                continue;
            }
            let fragment = match CodeFragment::parse(found.as_str(), found.start()) {
                Ok(fragment) => fragment,
                Err(e) => {
                    log::debug!("skipping code block: {e}");
                    continue;
                },
            };
            let start = source.text().len();
            source.append(fragment.reconstruct(self.annotation_class));
            blocks.push(Block {
                changed: false,
                fragment,
                span: found.range(),
                text: start..source.text().len(),
            });
        }
        if blocks.is_empty() {
            return Ok(html.to_string());
        }

        let links = self.plan(source.text());
        if links.is_empty() {
            return Ok(html.to_string());
        }
        for (run, planned) in group_by_run(&source, links) {
            let Some(text_run) = source.runs().get(run) else {
                continue;
            };
            if has_anchor_ancestor(&text_run.node) {
                continue;
            }
            let local: Vec<(usize, usize, String)> = planned
                .into_iter()
                .map(|link| return (link.offset.saturating_sub(text_run.start), link.len, link.target.url))
                .collect();
            if !split_and_wrap(&text_run.node, &local) {
                continue;
            }
            if let Some(block) = blocks.iter_mut().find(|b| return b.text.contains(&text_run.start)) {
                block.changed = true;
            }
        }

        let mut output = html.to_string();
        for block in blocks.iter().rev().filter(|b| return b.changed) {
            output.replace_range(block.span.clone(), &block.fragment.to_html()?);
        }
        return Ok(output);
    }

    /// Resolve every identifier of the page source and keep those with an
    /// accepted definition and a documentation URL.
    fn plan(&self, text: &str) -> Vec<PlannedLink> {
        let script = match Script::new(self.index, text) {
            Ok(script) => script,
            Err(e) => {
                log::debug!("skipping page code: {e}");
                return Vec::new();
            },
        };

        let mut planned = Vec::new();
        for name in script.names() {
            let position = name.start_position();
            let line = position.row.saturating_add(1);
            let resolved = script.goto(line, position.column).map(|definitions| {
                let candidate = Candidate {
                    column: position.column,
                    definitions,
                    len: name.byte_range().len(),
                    line,
                    offset: name.start_byte(),
                };
                return (candidate.accepted(self.namespace).cloned(), candidate);
            });
            match resolved {
                Ok((Some(definition), candidate)) => {
                    if let Some(target) = self.target_for(&definition) {
                        planned.push(PlannedLink {
                            len: candidate.len,
                            offset: candidate.offset,
                            target,
                        });
                    }
                },
                Ok((None, _)) => {},
                Err(e) => log_miss(&e),
            }
        }
        return planned;
    }

    /// Documentation page of an accepted definition.
    fn target_for(&self, definition: &Definition) -> Option<LinkTarget> {
        let target = self.links.target(&definition.full_name);
        if target.is_none() {
            log::debug!("no documentation page for `{}`", definition.full_name);
        }
        return target;
    }
}

/// Group planned links by the text run owning them. Links that straddle two
/// runs are dropped.
fn group_by_run(source: &ReconstructedSource, links: Vec<PlannedLink>) -> BTreeMap<usize, Vec<PlannedLink>> {
    let mut grouped: BTreeMap<usize, Vec<PlannedLink>> = BTreeMap::new();
    for link in links {
        let Some(run) = source.run_index(link.offset) else {
            continue;
        };
        let covered = source.runs().get(run).is_some_and(|r| return r.covers(link.offset, link.len));
        if covered {
            grouped.entry(run).or_default().push(link);
        }
    }
    return grouped;
}

/// Whether the node already sits inside an `<a>` element.
fn has_anchor_ancestor(node: &NodeRef) -> bool {
    return node
        .ancestors()
        .any(|ancestor| return ancestor.as_element().is_some_and(|e| return e.name.local.as_ref() == "a"));
}

/// Replace a text node by text and anchors, wrapping each `(offset, len,
/// url)` range. Returns whether anything changed.
fn split_and_wrap(text_node: &NodeRef, links: &[(usize, usize, String)]) -> bool {
    let Some(text) = text_node.as_text() else {
        return false;
    };
    let content = text.borrow().clone();

    let mut pieces = Vec::new();
    let mut copied = 0usize;
    for (offset, len, url) in links {
        let end = offset.saturating_add(*len);
        if *offset < copied {
            continue;
        }
        let (Some(before), Some(name)) = (content.get(copied..*offset), content.get(*offset..end)) else {
            continue;
        };
        if !before.is_empty() {
            pieces.push(NodeRef::new_text(before));
        }
        pieces.push(anchor(url, name));
        copied = end;
    }
    if pieces.is_empty() {
        return false;
    }
    if let Some(rest) = content.get(copied..).filter(|rest| return !rest.is_empty()) {
        pieces.push(NodeRef::new_text(rest));
    }

    for piece in pieces {
        text_node.insert_before(piece);
    }
    text_node.detach();
    return true;
}

/// `<a class="clickable-discrete-link" href="url">name</a>`.
fn anchor(url: &str, name: &str) -> NodeRef {
    let link = NodeRef::new_element(
        QualName::new(None, ns!(html), local_name!("a")),
        vec![
            (
                ExpandedName::new("", "class"),
                Attribute {
                    prefix: None,
                    value: DISCRETE_LINK_CLASS.to_string(),
                },
            ),
            (
                ExpandedName::new("", "href"),
                Attribute {
                    prefix: None,
                    value: url.to_string(),
                },
            ),
        ],
    );
    link.append(NodeRef::new_text(name));
    return link;
}

/// Resolution failures are per identifier and never abort the page.
fn log_miss(error: &ResolutionError) {
    log::debug!("unresolved identifier: {error}");
}
