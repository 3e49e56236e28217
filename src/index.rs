//! Symbol index over the Python sources whose symbols get linked.
//!
//! Built once per build from the configured source roots and read-only
//! afterwards. Stores concrete definitions plus the import aliases that
//! re-export them, so lookups can follow imports to the defining module.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tree_sitter::Node;
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, ResolutionError};
use crate::grammar::{self, dotted_text, node_text};
use crate::types::{Definition, DefinitionKind};

/// Maximum source file size (16 MiB).
const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// How many alias hops or base-class steps a single lookup may take.
const MAX_DEPTH: u8 = 32;

/// Directory names never descended into while indexing.
const SKIPPED_DIRS: &[&str] = &["__pycache__", "node_modules", "site", "target"];

/// One name stored in the index.
#[derive(Debug, Clone)]
enum Entry {
    /// Import binding: the name stands for another dotted path.
    Alias(String),
    /// A concrete definition.
    Def(DefEntry),
}

/// A concrete definition and what is needed to look through it.
#[derive(Debug, Clone)]
struct DefEntry {
    /// Base classes as written, resolved lazily in `scope`.
    bases: Vec<String>,
    /// Kind of the definition.
    kind: DefinitionKind,
    /// One-based line of the definition.
    line: u32,
    /// File holding the definition; `None` for implicit namespace packages.
    path: Option<PathBuf>,
    /// Dotted return annotation, for functions.
    returns: Option<String>,
    /// Module whose globals resolve `bases` and `returns`.
    scope: String,
}

/// Read-only map from fully qualified names to definitions and aliases.
#[derive(Debug, Default)]
pub struct SymbolIndex {
    /// Every indexed name, keyed by its full dotted path.
    entries: BTreeMap<String, Entry>,
    /// Modules pulled in by `from x import *`, keyed by importing module.
    star_imports: BTreeMap<String, Vec<String>>,
}

impl SymbolIndex {
    /// Index every Python file below each root. Module names come from the
    /// path relative to its root (`pkg/math.py` → `pkg.math`).
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if a file cannot be read, `Error::SourceTooLarge`
    /// for oversized files, or `Error::ParseFailed` if tree-sitter gives up.
    pub fn build(roots: &[PathBuf]) -> Result<Self, Error> {
        let mut index = Self::default();

        for root in roots {
            for entry in WalkDir::new(root)
                .into_iter()
                .filter_entry(|e| return !is_skipped_dir(e))
                .filter_map(Result::ok)
                .filter(|e| return e.file_type().is_file() && grammar::is_python_source(e.path()))
            {
                let path = entry.path();
                let relative = path.strip_prefix(root).unwrap_or(path);
                let Some((module, is_package)) = module_name_for_path(relative) else {
                    continue;
                };
                let source = read_source(path)?;
                index.add_module(&module, is_package, Some(path), &source)?;
            }
        }

        log::info!("indexed {} symbols", index.entries.len());
        return Ok(index);
    }

    /// Index one module from source text.
    ///
    /// # Errors
    ///
    /// Returns `Error::ParseFailed` if tree-sitter cannot parse the source.
    pub fn add_module(
        &mut self,
        module: &str,
        is_package: bool,
        path: Option<&Path>,
        source: &str,
    ) -> Result<(), Error> {
        self.ensure_parent_packages(module);
        self.entries.insert(
            module.to_string(),
            Entry::Def(DefEntry {
                bases: Vec::new(),
                kind: DefinitionKind::Module,
                line: 1,
                path: path.map(Path::to_path_buf),
                returns: None,
                scope: module.to_string(),
            }),
        );

        let file = path.map_or_else(|| return PathBuf::from(module), Path::to_path_buf);
        let tree = grammar::parse_python(&file, source)?;
        let package = if is_package { module.to_string() } else { parent_of(module).to_string() };

        let mut collector = Collector {
            index: self,
            module,
            package: &package,
            path,
            source,
        };
        collector.block(tree.root_node(), module, false);
        return Ok(());
    }

    /// Every concrete definition, in name order.
    pub fn definitions(&self) -> impl Iterator<Item = Definition> + '_ {
        return self
            .entries
            .keys()
            .filter_map(|name| return self.definition(name));
    }

    /// For a class, the class itself; for a function with a resolvable
    /// return annotation, that class. This is what calling the value yields.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError::TooDeep` on runaway alias chains.
    pub fn instance_class(&self, callee: &Definition) -> Result<Option<Definition>, ResolutionError> {
        let Some(Entry::Def(entry)) = self.entries.get(&callee.full_name) else {
            return Ok(None);
        };
        let class = match (entry.kind, &entry.returns) {
            (DefinitionKind::Class, _) => Some(callee.full_name.clone()),
            (DefinitionKind::Function, Some(returns)) => self.resolve_in_scope(&entry.scope, returns, 0)?,
            _ => None,
        };
        return Ok(class
            .and_then(|name| return self.definition(&name))
            .filter(|d| return d.kind == DefinitionKind::Class));
    }

    /// Whether the index holds no names at all.
    pub fn is_empty(&self) -> bool {
        return self.entries.is_empty();
    }

    /// Number of indexed names, aliases included.
    pub fn len(&self) -> usize {
        return self.entries.len();
    }

    /// Look up `name` on a module or class, following imports, star imports
    /// and base classes.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError::TooDeep` on runaway alias chains.
    pub fn member(&self, owner: &Definition, name: &str) -> Result<Option<Definition>, ResolutionError> {
        let found = self.member_at(&owner.full_name, name, 0)?;
        return Ok(found.and_then(|n| return self.definition(&n)));
    }

    /// Resolve an absolute dotted path (`pkg.add`) to the definition it
    /// finally names, following re-exports.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError::TooDeep` on runaway alias chains.
    pub fn resolve(&self, dotted: &str) -> Result<Option<Definition>, ResolutionError> {
        let found = self.resolve_path(dotted, 0)?;
        return Ok(found.and_then(|n| return self.definition(&n)));
    }

    // ── Lookup internals ──────────────────────────────────────────────

    /// Turn a canonical name (a `Def` key) into a public definition.
    fn definition(&self, full_name: &str) -> Option<Definition> {
        let Some(Entry::Def(entry)) = self.entries.get(full_name) else {
            return None;
        };
        return Some(Definition {
            full_name: full_name.to_string(),
            kind: entry.kind,
            line: Some(entry.line),
            path: entry.path.clone(),
        });
    }

    /// Register implicit packages for every dotted prefix of `module`.
    fn ensure_parent_packages(&mut self, module: &str) {
        let mut prefix = module;
        while let Some((parent, _)) = prefix.rsplit_once('.') {
            self.entries.entry(parent.to_string()).or_insert_with(|| {
                return Entry::Def(DefEntry {
                    bases: Vec::new(),
                    kind: DefinitionKind::Module,
                    line: 1,
                    path: None,
                    returns: None,
                    scope: parent.to_string(),
                });
            });
            prefix = parent;
        }
    }

    /// Follow a name stored verbatim in the index to its canonical name.
    fn lookup_exact(&self, full_name: &str, depth: u8) -> Result<Option<String>, ResolutionError> {
        return match self.entries.get(full_name) {
            None => Ok(None),
            Some(Entry::Def(_)) => Ok(Some(full_name.to_string())),
            Some(Entry::Alias(target)) => self.resolve_path(target, depth.saturating_add(1)),
        };
    }

    /// Member lookup on a canonical owner name.
    fn member_at(&self, owner: &str, name: &str, depth: u8) -> Result<Option<String>, ResolutionError> {
        if depth > MAX_DEPTH {
            return Err(ResolutionError::TooDeep {
                name: format!("{owner}.{name}"),
            });
        }
        let Some(Entry::Def(entry)) = self.entries.get(owner) else {
            return Ok(None);
        };

        let direct = format!("{owner}.{name}");
        if let Some(found) = self.lookup_exact(&direct, depth.saturating_add(1))? {
            return Ok(Some(found));
        }

        let next = depth.saturating_add(1);
        match entry.kind {
            DefinitionKind::Module => {
                for source in self.star_imports.get(owner).into_iter().flatten() {
                    let Some(source_module) = self.resolve_path(source, next)? else {
                        continue;
                    };
                    if let Some(found) = self.member_at(&source_module, name, next)? {
                        return Ok(Some(found));
                    }
                }
            },
            DefinitionKind::Class => {
                for base in &entry.bases {
                    let Some(base_name) = self.resolve_in_scope(&entry.scope, base, next)? else {
                        continue;
                    };
                    if base_name == owner {
                        continue;
                    }
                    if let Some(found) = self.member_at(&base_name, name, next)? {
                        return Ok(Some(found));
                    }
                }
            },
            DefinitionKind::Function | DefinitionKind::Variable => {},
        }

        return Ok(None);
    }

    /// Resolve an absolute dotted path segment by segment.
    fn resolve_path(&self, dotted: &str, depth: u8) -> Result<Option<String>, ResolutionError> {
        if depth > MAX_DEPTH {
            return Err(ResolutionError::TooDeep {
                name: dotted.to_string(),
            });
        }
        let mut segments = dotted.split('.');
        let Some(first) = segments.next() else {
            return Ok(None);
        };
        let Some(mut current) = self.lookup_exact(first, depth.saturating_add(1))? else {
            return Ok(None);
        };
        for segment in segments {
            let Some(next) = self.member_at(&current, segment, depth.saturating_add(1))? else {
                return Ok(None);
            };
            current = next;
        }
        return Ok(Some(current));
    }

    /// Resolve a dotted name as it would be seen from inside `module`.
    fn resolve_in_scope(
        &self,
        module: &str,
        dotted: &str,
        depth: u8,
    ) -> Result<Option<String>, ResolutionError> {
        let (first, rest) = match dotted.split_once('.') {
            Some((first, rest)) => (first, Some(rest)),
            None => (dotted, None),
        };
        let Some(mut current) = self.member_at(module, first, depth.saturating_add(1))? else {
            return Ok(None);
        };
        for segment in rest.into_iter().flat_map(|r| return r.split('.')) {
            let Some(next) = self.member_at(&current, segment, depth.saturating_add(1))? else {
                return Ok(None);
            };
            current = next;
        }
        return Ok(Some(current));
    }
}

// ── Collection ────────────────────────────────────────────────────────

/// Walks one module's syntax tree and records what it binds.
struct Collector<'a> {
    /// Index being filled.
    index: &'a mut SymbolIndex,
    /// Full name of the module being collected.
    module: &'a str,
    /// Package used as the anchor for relative imports.
    package: &'a str,
    /// File being collected, if it came from disk.
    path: Option<&'a Path>,
    /// Module source text.
    source: &'a str,
}

impl Collector<'_> {
    /// Record an import binding unless the name is already bound.
    fn alias(&mut self, full_name: String, target: String) {
        if full_name == target {
            return;
        }
        self.index.entries.entry(full_name).or_insert(Entry::Alias(target));
    }

    /// Collect the assignment targets of one `assignment` node.
    fn assignment(&mut self, node: Node<'_>, owner: &str) {
        if let Some(left) = node.child_by_field_name("left") {
            for target in assignment_targets(left) {
                if let Some(name) = node_text(target, self.source) {
                    self.define(format!("{owner}.{name}"), DefinitionKind::Variable, target, None, Vec::new());
                }
            }
        }
        // Chained `a = b = value` nests the second assignment on the right.
        if let Some(right) = node.child_by_field_name("right").filter(|r| return r.kind() == "assignment") {
            self.assignment(right, owner);
        }
    }

    /// Collect the statements of a block-like node into `owner`.
    fn block(&mut self, node: Node<'_>, owner: &str, in_class: bool) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.statement(child, owner, in_class);
        }
    }

    /// Record a `class` statement and its body.
    fn class(&mut self, node: Node<'_>, owner: &str) {
        let Some(name) = node.child_by_field_name("name").and_then(|n| return node_text(n, self.source)) else {
            return;
        };
        let full_name = format!("{owner}.{name}");

        let mut bases = Vec::new();
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            bases.extend(
                superclasses
                    .named_children(&mut cursor)
                    .filter_map(|base| return dotted_text(base, self.source)),
            );
        }

        self.define(full_name.clone(), DefinitionKind::Class, node, None, bases);
        if let Some(body) = node.child_by_field_name("body") {
            self.block(body, &full_name, true);
        }
    }

    /// Insert a definition unless the name is already defined.
    fn define(&mut self, full_name: String, kind: DefinitionKind, node: Node<'_>, returns: Option<String>, bases: Vec<String>) {
        let line = u32::try_from(node.start_position().row.saturating_add(1)).unwrap_or(u32::MAX);
        let entry = Entry::Def(DefEntry {
            bases,
            kind,
            line,
            path: self.path.map(Path::to_path_buf),
            returns,
            scope: self.module.to_string(),
        });
        self.index.entries.entry(full_name).or_insert(entry);
    }

    /// Record a `def` statement; methods also contribute `self.x` attributes.
    fn function(&mut self, node: Node<'_>, owner: &str, in_class: bool) {
        let Some(name) = node.child_by_field_name("name").and_then(|n| return node_text(n, self.source)) else {
            return;
        };
        let returns = node
            .child_by_field_name("return_type")
            .and_then(|r| return dotted_text(r, self.source));
        self.define(format!("{owner}.{name}"), DefinitionKind::Function, node, returns, Vec::new());

        if let Some(body) = node.child_by_field_name("body").filter(|_| return in_class) {
            self.instance_attributes(body, owner);
        }
    }

    /// Record `import a.b` and `import a.b as c`.
    fn import(&mut self, node: Node<'_>, owner: &str) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "dotted_name" => {
                    let Some(dotted) = dotted_text(child, self.source) else { continue };
                    let first = dotted.split('.').next().unwrap_or_default().to_string();
                    self.alias(format!("{owner}.{first}"), first);
                },
                "aliased_import" => {
                    let target = child.child_by_field_name("name").and_then(|n| return dotted_text(n, self.source));
                    let alias = child.child_by_field_name("alias").and_then(|n| return node_text(n, self.source));
                    if let (Some(target), Some(alias)) = (target, alias) {
                        self.alias(format!("{owner}.{alias}"), target);
                    }
                },
                _ => {},
            }
        }
    }

    /// Record `from m import a, b as c` and `from m import *`.
    fn import_from(&mut self, node: Node<'_>, owner: &str) {
        let Some(module_node) = node.child_by_field_name("module_name") else {
            return;
        };
        let Some(base) = self.import_base(module_node) else {
            return;
        };

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "wildcard_import" {
                self.index.star_imports.entry(owner.to_string()).or_default().push(base.clone());
            }
        }

        let mut cursor = node.walk();
        for name_node in node.children_by_field_name("name", &mut cursor) {
            let (imported, bound) = match name_node.kind() {
                "aliased_import" => (
                    name_node.child_by_field_name("name").and_then(|n| return dotted_text(n, self.source)),
                    name_node
                        .child_by_field_name("alias")
                        .and_then(|n| return node_text(n, self.source))
                        .map(String::from),
                ),
                _ => {
                    let imported = dotted_text(name_node, self.source);
                    (imported.clone(), imported)
                },
            };
            if let (Some(imported), Some(bound)) = (imported, bound) {
                self.alias(format!("{owner}.{bound}"), join_dotted(&base, &imported));
            }
        }
    }

    /// Absolute module named by the `module_name` of a `from` import.
    fn import_base(&self, module_node: Node<'_>) -> Option<String> {
        if module_node.kind() != "relative_import" {
            return dotted_text(module_node, self.source);
        }

        let mut cursor = module_node.walk();
        let mut level = 0_usize;
        let mut dotted = None;
        for child in module_node.named_children(&mut cursor) {
            match child.kind() {
                "import_prefix" => level = node_text(child, self.source).map_or(0, |p| return p.matches('.').count()),
                "dotted_name" => dotted = dotted_text(child, self.source),
                _ => {},
            }
        }

        let mut base = self.package;
        for _ in 1..level {
            base = parent_of(base);
        }
        return match dotted {
            Some(dotted) => Some(join_dotted(base, &dotted)),
            None if base.is_empty() => None,
            None => Some(base.to_string()),
        };
    }

    /// Record `self.<name> = …` assignments found anywhere in a method body.
    fn instance_attributes(&mut self, node: Node<'_>, class: &str) {
        let left = node.child_by_field_name("left").filter(|_| return node.kind() == "assignment");
        for target in left.map(assignment_targets_with_attributes).unwrap_or_default() {
            let object = target.child_by_field_name("object").and_then(|o| return node_text(o, self.source));
            let attribute = target.child_by_field_name("attribute").and_then(|a| return node_text(a, self.source));
            if let (Some("self"), Some(attribute)) = (object, attribute) {
                self.define(format!("{class}.{attribute}"), DefinitionKind::Variable, target, None, Vec::new());
            }
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.instance_attributes(child, class);
        }
    }

    /// Dispatch a single statement.
    fn statement(&mut self, node: Node<'_>, owner: &str, in_class: bool) {
        match node.kind() {
            "function_definition" => self.function(node, owner, in_class),
            "class_definition" => self.class(node, owner),
            "decorated_definition" => {
                if let Some(definition) = node.child_by_field_name("definition") {
                    self.statement(definition, owner, in_class);
                }
            },
            "expression_statement" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if child.kind() == "assignment" {
                        self.assignment(child, owner);
                    }
                }
            },
            "import_statement" => self.import(node, owner),
            "import_from_statement" => self.import_from(node, owner),
            "if_statement" | "elif_clause" | "else_clause" | "try_statement" | "except_clause"
            | "finally_clause" | "with_statement" | "for_statement" | "while_statement" | "block" => {
                self.block(node, owner, in_class);
            },
            _ => {},
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────

/// Plain identifiers bound by an assignment's left-hand side.
fn assignment_targets(left: Node<'_>) -> Vec<Node<'_>> {
    return match left.kind() {
        "identifier" => vec![left],
        "pattern_list" | "tuple_pattern" | "list_pattern" => {
            let mut cursor = left.walk();
            left.named_children(&mut cursor)
                .filter(|c| return c.kind() == "identifier")
                .collect()
        },
        _ => Vec::new(),
    };
}

/// Attribute targets (`self.x`) bound by an assignment's left-hand side.
fn assignment_targets_with_attributes(left: Node<'_>) -> Vec<Node<'_>> {
    return match left.kind() {
        "attribute" => vec![left],
        "pattern_list" | "tuple_pattern" | "list_pattern" => {
            let mut cursor = left.walk();
            left.named_children(&mut cursor)
                .filter(|c| return c.kind() == "attribute")
                .collect()
        },
        _ => Vec::new(),
    };
}

/// Skip hidden directories and build/cache output, but never the root itself.
fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    return name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref());
}

/// Join two dotted paths, tolerating an empty left side.
fn join_dotted(base: &str, name: &str) -> String {
    if base.is_empty() {
        return name.to_string();
    }
    return format!("{base}.{name}");
}

/// Module name and package flag for a path relative to a source root.
/// `pkg/__init__.py` → `("pkg", true)`, `pkg/math.py` → `("pkg.math", false)`.
fn module_name_for_path(relative: &Path) -> Option<(String, bool)> {
    let stem = relative.file_stem()?.to_str()?;
    let mut parts: Vec<&str> = Vec::new();
    if let Some(parent) = relative.parent() {
        for component in parent.components() {
            parts.push(component.as_os_str().to_str()?);
        }
    }

    let is_package = stem == "__init__";
    if !is_package {
        parts.push(stem);
    }
    if parts.is_empty() || !parts.iter().all(|p| return grammar::is_identifier(p)) {
        return None;
    }
    return Some((parts.join("."), is_package));
}

/// Everything before the last dot, or `""` for a top-level name.
fn parent_of(dotted: &str) -> &str {
    return dotted.rsplit_once('.').map_or("", |(parent, _)| return parent);
}

/// Read a source file, refusing oversized ones.
///
/// # Errors
///
/// Returns `Error::SourceTooLarge` or `Error::Io`.
fn read_source(path: &Path) -> Result<String, Error> {
    let size_bytes = std::fs::metadata(path)?.len();
    if size_bytes > MAX_FILE_SIZE {
        return Err(Error::SourceTooLarge {
            file: path.to_path_buf(),
            max_bytes: MAX_FILE_SIZE,
            size_bytes,
        });
    }
    return Ok(std::fs::read_to_string(path)?);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests")]
pub(crate) mod tests {
    use super::*;

    /// The two-module demo package used across the crate's tests.
    pub(crate) fn demo_index() -> SymbolIndex {
        let mut index = SymbolIndex::default();
        index
            .add_module(
                "demo_package",
                true,
                Some(Path::new("/work/demo_package/__init__.py")),
                "from .math import MovingAverage, add, scale_values\n\n__all__ = [\"add\"]\n",
            )
            .unwrap();
        index
            .add_module(
                "demo_package.math",
                false,
                Some(Path::new("/work/demo_package/math.py")),
                "from collections import deque\n\
                 \n\
                 def add(a, b):\n\
                 \x20   return a + b\n\
                 \n\
                 class MovingAverage:\n\
                 \x20   def __init__(self, window: int = 3):\n\
                 \x20       self.window = window\n\
                 \n\
                 \x20   def update(self, value):\n\
                 \x20       return value\n\
                 \n\
                 def make_average() -> \"MovingAverage\":\n\
                 \x20   return MovingAverage()\n\
                 \n\
                 WINDOW = 3\n",
            )
            .unwrap();
        index
    }

    #[test]
    fn follows_reexports_to_defining_module() {
        let index = demo_index();
        let add = index.resolve("demo_package.add").unwrap().unwrap();
        assert_eq!(add.full_name, "demo_package.math.add");
        assert_eq!(add.kind, DefinitionKind::Function);
        assert_eq!(add.line, Some(3));
        assert_eq!(add.path.as_deref(), Some(Path::new("/work/demo_package/math.py")));
    }

    #[test]
    fn resolves_methods_and_instance_attributes() {
        let index = demo_index();
        let update = index.resolve("demo_package.MovingAverage.update").unwrap().unwrap();
        assert_eq!(update.full_name, "demo_package.math.MovingAverage.update");
        assert_eq!(update.line, Some(10));

        let window = index.resolve("demo_package.math.MovingAverage.window").unwrap().unwrap();
        assert_eq!(window.kind, DefinitionKind::Variable);
        assert_eq!(window.line, Some(8));
    }

    #[test]
    fn unknown_and_external_names_are_misses() {
        let index = demo_index();
        assert!(index.resolve("demo_package.nope").unwrap().is_none());
        assert!(index.resolve("demo_package.math.deque").unwrap().is_none());
        assert!(index.resolve("numpy").unwrap().is_none());
    }

    #[test]
    fn return_annotation_gives_instance_class() {
        let index = demo_index();
        let factory = index.resolve("demo_package.math.make_average").unwrap().unwrap();
        let class = index.instance_class(&factory).unwrap().unwrap();
        assert_eq!(class.full_name, "demo_package.math.MovingAverage");
    }

    #[test]
    fn inherited_members_and_star_imports() {
        let mut index = SymbolIndex::default();
        index
            .add_module("lib", true, None, "from .base import *\nfrom .child import Child\n")
            .unwrap();
        index
            .add_module("lib.base", false, None, "class Base:\n    def run(self):\n        pass\n")
            .unwrap();
        index
            .add_module("lib.child", false, None, "from . import base\n\nclass Child(base.Base):\n    pass\n")
            .unwrap();

        let run = index.resolve("lib.Child.run").unwrap().unwrap();
        assert_eq!(run.full_name, "lib.base.Base.run");
        let base = index.resolve("lib.Base").unwrap().unwrap();
        assert_eq!(base.full_name, "lib.base.Base");
    }

    #[test]
    fn alias_cycles_stop_at_depth_limit() {
        let mut index = SymbolIndex::default();
        index.add_module("a", false, None, "from b import x\n").unwrap();
        index.add_module("b", false, None, "from a import x\n").unwrap();
        assert!(matches!(index.resolve("a.x"), Err(ResolutionError::TooDeep { .. })));
    }

    #[test]
    fn module_names_from_paths() {
        assert_eq!(
            module_name_for_path(Path::new("pkg/__init__.py")),
            Some(("pkg".to_string(), true))
        );
        assert_eq!(
            module_name_for_path(Path::new("pkg/sub/math.py")),
            Some(("pkg.sub.math".to_string(), false))
        );
        assert_eq!(module_name_for_path(Path::new("__init__.py")), None);
        assert_eq!(module_name_for_path(Path::new("my-scripts/run.py")), None);
    }
}
