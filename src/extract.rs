//! Recover source text from syntax-highlighted `<code>` HTML, keeping a
//! mapping from every byte back to the DOM text node that produced it.

use kuchiki::NodeRef;
use kuchiki::traits::TendrilSink;

use crate::error::Error;

/// One `<code>` element parsed into its own DOM.
pub struct CodeFragment {
    /// The `<code>` element inside the parsed document.
    code: NodeRef,
    /// Root of the parsed `<pre>` wrapper, kept alive with the fragment.
    _document: NodeRef,
}

impl CodeFragment {
    /// Parse a `<code>…</code>` substring of a page. `offset` is the byte
    /// position of the fragment in the page and only feeds diagnostics.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedFragment` if the parsed tree holds no `<code>`
    /// element.
    pub fn parse(html: &str, offset: usize) -> Result<Self, Error> {
        let document = kuchiki::parse_html().one(format!("<pre>{html}</pre>"));
        let code = document.select_first("code").map_err(|()| {
            return Error::MalformedFragment {
                offset,
                reason: "no <code> element after parsing".to_string(),
            };
        })?;
        return Ok(Self {
            code: code.as_node().clone(),
            _document: document,
        });
    }

    /// Concatenate the literal text of the fragment, skipping annotation
    /// overlays.
    pub fn reconstruct(&self, annotation_class: &str) -> ReconstructedSource {
        let mut source = ReconstructedSource::default();
        collect_text(&self.code, annotation_class, &mut source);
        return source;
    }

    /// Serialize the `<code>` element, including its own tag.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the serializer fails to write.
    pub fn to_html(&self) -> Result<String, Error> {
        let mut out = Vec::new();
        self.code.serialize(&mut out)?;
        return Ok(String::from_utf8_lossy(&out).into_owned());
    }
}

/// A contiguous run of literal text owned by one DOM text node.
#[derive(Debug, Clone)]
pub struct TextRun {
    /// Byte length of the node's text.
    pub len: usize,
    /// The text node the run came from.
    pub node: NodeRef,
    /// Byte offset of the run in the reconstructed text.
    pub start: usize,
}

impl TextRun {
    /// Whether `range` lies entirely inside this run.
    pub fn covers(&self, start: usize, len: usize) -> bool {
        return start >= self.start && start.saturating_add(len) <= self.start.saturating_add(self.len);
    }
}

/// Source text recovered from one or more code fragments, with run starts
/// strictly increasing.
#[derive(Debug, Clone, Default)]
pub struct ReconstructedSource {
    /// Text runs in document order.
    runs: Vec<TextRun>,
    /// The recovered source.
    text: String,
}

impl ReconstructedSource {
    /// Append another source into this offset space, followed by a newline.
    pub fn append(&mut self, other: Self) {
        let base = self.text.len();
        self.text.push_str(&other.text);
        self.text.push('\n');
        self.runs.extend(other.runs.into_iter().map(|mut run| {
            run.start = run.start.saturating_add(base);
            return run;
        }));
    }

    /// The run owning byte `position`: the one with the greatest start at
    /// or before it.
    pub fn owner_at(&self, position: usize) -> Option<&TextRun> {
        return self.run_index(position).and_then(|i| return self.runs.get(i));
    }

    /// Index of the run owning byte `position`.
    pub fn run_index(&self, position: usize) -> Option<usize> {
        let after = self.runs.partition_point(|run| return run.start <= position);
        return after.checked_sub(1);
    }

    /// All runs, in document order.
    pub fn runs(&self) -> &[TextRun] {
        return &self.runs;
    }

    /// The recovered source text.
    pub fn text(&self) -> &str {
        return &self.text;
    }

    /// Record a text node. Empty text adds nothing.
    fn push(&mut self, node: NodeRef, content: &str) {
        if content.is_empty() {
            return;
        }
        self.runs.push(TextRun {
            len: content.len(),
            node,
            start: self.text.len(),
        });
        self.text.push_str(content);
    }
}

/// Depth-first walk appending text nodes and skipping annotation subtrees.
fn collect_text(node: &NodeRef, annotation_class: &str, out: &mut ReconstructedSource) {
    for child in node.children() {
        if let Some(text) = child.as_text() {
            let content = text.borrow().clone();
            out.push(child.clone(), &content);
            continue;
        }
        if let Some(element) = child.as_element() {
            let is_annotation = element
                .attributes
                .borrow()
                .get("class")
                .is_some_and(|classes| return classes.split_whitespace().any(|c| return c == annotation_class));
            if is_annotation {
                continue;
            }
        }
        collect_text(&child, annotation_class, out);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests")]
mod tests {
    use super::*;

    const HIGHLIGHTED: &str = "<code><span class=\"kn\">from</span> <span class=\"nn\">demo_package</span> \
         <span class=\"kn\">import</span> <span class=\"n\">add</span>\n\
         <span class=\"n\">add</span><span class=\"p\">(</span><span class=\"mi\">1</span><span class=\"p\">)</span>\
         <span class=\"md-annotation\"><span>(1)</span></span>\n</code>";

    #[test]
    fn reconstructs_source_without_annotations() {
        let fragment = CodeFragment::parse(HIGHLIGHTED, 0).unwrap();
        let source = fragment.reconstruct("md-annotation");
        assert_eq!(source.text(), "from demo_package import add\nadd(1)\n");
    }

    #[test]
    fn runs_reproduce_text_and_own_their_bytes() {
        let fragment = CodeFragment::parse(HIGHLIGHTED, 0).unwrap();
        let source = fragment.reconstruct("md-annotation");

        let joined: String = source
            .runs()
            .iter()
            .map(|run| run.node.as_text().unwrap().borrow().clone())
            .collect();
        assert_eq!(joined, source.text());

        for (i, run) in source.runs().iter().enumerate() {
            for position in run.start..run.start + run.len {
                assert_eq!(source.run_index(position), Some(i));
            }
        }
        let add = source.text().rfind("add").unwrap();
        let owner = source.owner_at(add).unwrap();
        assert_eq!(owner.node.as_text().unwrap().borrow().as_str(), "add");
        assert!(owner.covers(add, 3));
    }

    #[test]
    fn append_shifts_offsets_and_separates_blocks() {
        let first = CodeFragment::parse("<code>a = 1</code>", 0).unwrap().reconstruct("md-annotation");
        let second = CodeFragment::parse("<code>b</code>", 20).unwrap().reconstruct("md-annotation");
        let mut page = ReconstructedSource::default();
        page.append(first);
        page.append(second);
        assert_eq!(page.text(), "a = 1\nb\n");
        assert_eq!(page.runs()[1].start, 6);
    }

    #[test]
    fn empty_block_has_no_runs() {
        let source = CodeFragment::parse("<code></code>", 0).unwrap().reconstruct("md-annotation");
        assert!(source.runs().is_empty());
        assert!(source.owner_at(0).is_none());
    }

    #[test]
    fn serializes_the_code_element() {
        let fragment = CodeFragment::parse("<code class=\"x\">a &lt; b</code>", 0).unwrap();
        assert_eq!(fragment.to_html().unwrap(), "<code class=\"x\">a &lt; b</code>");
    }
}
