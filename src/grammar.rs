/// Tree-sitter grammar setup for the Python sources being linked.
use std::path::Path;

use tree_sitter::{Language, Node, Parser, Tree};

use crate::error::Error;

/// The tree-sitter language used for both indexed sources and code snippets.
pub fn python() -> Language {
    return tree_sitter_python::LANGUAGE.into();
}

/// Whether a path looks like an importable Python source file.
pub fn is_python_source(path: &Path) -> bool {
    return path.extension().and_then(|e| return e.to_str()) == Some("py");
}

/// Text of a node, or `None` if the byte range is not valid UTF-8.
pub fn node_text<'s>(node: Node<'_>, source: &'s str) -> Option<&'s str> {
    return node.utf8_text(source.as_bytes()).ok();
}

/// Render an expression as a dotted name (`a.b.c`) when it is one.
/// Accepts identifiers, attribute chains, `dotted_name` nodes, `type`
/// wrappers and string annotations such as `"MovingAverage"`.
pub fn dotted_text(node: Node<'_>, source: &str) -> Option<String> {
    return match node.kind() {
        "identifier" => node_text(node, source).map(String::from),
        "dotted_name" => {
            let mut cursor = node.walk();
            let parts: Option<Vec<&str>> = node
                .named_children(&mut cursor)
                .map(|part| return node_text(part, source))
                .collect();
            parts.map(|p| return p.join("."))
        },
        "attribute" => {
            let object = dotted_text(node.child_by_field_name("object")?, source)?;
            let attribute = node_text(node.child_by_field_name("attribute")?, source)?;
            Some(format!("{object}.{attribute}"))
        },
        "type" => dotted_text(node.named_child(0)?, source),
        "string" => {
            let raw = node_text(node, source)?.trim_matches(|c| return c == '"' || c == '\'');
            is_dotted_identifier(raw).then(|| return raw.to_string())
        },
        _ => None,
    };
}

/// Whether `text` is one or more Python identifiers joined by dots.
pub fn is_dotted_identifier(text: &str) -> bool {
    return !text.is_empty() && text.split('.').all(is_identifier);
}

/// Whether `text` is a single ASCII Python identifier.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    return (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| return c.is_ascii_alphanumeric() || c == '_');
}

/// Parse Python source into a tree. Syntax errors do not fail the parse;
/// tree-sitter recovers and marks them with `ERROR` nodes.
///
/// # Errors
///
/// Returns `Error::ParseFailed` if the language cannot be set or parsing fails.
pub fn parse_python(file_path: &Path, source: &str) -> Result<Tree, Error> {
    let mut parser = Parser::new();
    parser.set_language(&python()).map_err(|e| {
        return Error::ParseFailed {
            file: file_path.to_path_buf(),
            reason: e.to_string(),
        };
    })?;

    return parser.parse(source, None).ok_or_else(|| {
        return Error::ParseFailed {
            file: file_path.to_path_buf(),
            reason: "tree-sitter returned None".to_string(),
        };
    });
}
