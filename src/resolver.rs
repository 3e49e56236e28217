//! Per-page semantic analysis over reconstructed code.
//!
//! A [`Script`] parses the concatenated code of one page and answers two
//! questions for a cursor position: where is the name defined (`goto`) and
//! what does the expression evaluate to (`infer`). Library symbols come from
//! the [`SymbolIndex`]; names bound locally in the snippet resolve to nothing.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;
use std::rc::Rc;

use tree_sitter::{Node, Point, Tree};

use crate::error::ResolutionError;
use crate::grammar::{self, dotted_text, node_text};
use crate::index::SymbolIndex;
use crate::types::{Definition, DefinitionKind};

/// Maximum nesting of assignment chains followed by `infer`.
const MAX_INFER_DEPTH: u8 = 24;

/// Key under which a scope records its `from m import *` modules.
const STAR_IMPORTS: &str = "*";

/// How a name is bound inside one scope.
#[derive(Debug, Clone)]
enum Binding {
    /// Declared type: the name holds an instance of the annotation.
    Annotated(Range<usize>),
    /// Bound by an import to an absolute dotted path.
    Import(String),
    /// Bound locally in a way that never names a library symbol.
    Local,
    /// Every public name of the module, from `from module import *`.
    Star(String),
    /// Bound to the value of an expression.
    Value(Range<usize>),
}

/// Bindings of one scope: name → (position the binding takes effect, binding).
type ScopeBindings = HashMap<String, Vec<(usize, Binding)>>;

/// What an expression evaluates to, as far as static analysis can tell.
#[derive(Debug, Clone)]
enum Value {
    /// The expression names a definition.
    Definition(Definition),
    /// The expression is an instance of the given class.
    Instance(Definition),
    /// Builtin, local or dynamic.
    Unknown,
}

/// Parsed page code plus the index it resolves against.
pub struct Script<'a> {
    /// Library symbols.
    index: &'a SymbolIndex,
    /// Lazily collected bindings, keyed by scope node id.
    scopes: RefCell<HashMap<usize, Rc<ScopeBindings>>>,
    /// The code being analyzed.
    source: &'a str,
    /// Syntax tree of `source`.
    tree: Tree,
}

impl<'a> Script<'a> {
    /// Parse `source` for analysis.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError::Unparseable` if tree-sitter cannot produce a tree.
    pub fn new(index: &'a SymbolIndex, source: &'a str) -> Result<Self, ResolutionError> {
        let tree = grammar::parse_python(Path::new("<page>"), source).map_err(|e| {
            return ResolutionError::Unparseable { reason: e.to_string() };
        })?;
        return Ok(Self {
            index,
            scopes: RefCell::new(HashMap::new()),
            source,
            tree,
        });
    }

    /// Definitions of the name at `line` (one-based) and `column` (zero-based
    /// byte), in analyzer order. Names bound locally yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError::NoName` if the cursor is not on a name, or
    /// `ResolutionError::TooDeep` on runaway alias chains.
    pub fn goto(&self, line: usize, column: usize) -> Result<Vec<Definition>, ResolutionError> {
        let name = self.name_at(line, column)?;
        return self.goto_name(name);
    }

    /// Definition of the value of the expression ending at the cursor. An
    /// instance yields its class.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError::NoName` if the cursor is not on a name, or
    /// `ResolutionError::TooDeep` on runaway alias and assignment chains.
    pub fn infer(&self, line: usize, column: usize) -> Result<Vec<Definition>, ResolutionError> {
        let name = self.name_at(line, column)?;
        let expression = match name.parent() {
            Some(parent) if parent.kind() == "attribute" && is_field(parent, "attribute", name) => parent,
            _ => name,
        };
        return match self.infer_expr(expression, 0)? {
            Value::Definition(d) | Value::Instance(d) => Ok(vec![d]),
            Value::Unknown => Ok(Vec::new()),
        };
    }

    /// Every identifier token in the source, at any depth, in document order.
    pub fn names(&self) -> Vec<Node<'_>> {
        let mut names = Vec::new();
        let mut cursor = self.tree.walk();
        loop {
            if cursor.node().kind() == "identifier" {
                names.push(cursor.node());
            }
            if cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return names;
                }
            }
        }
    }

    // ── goto ──────────────────────────────────────────────────────────

    /// Resolve a name node to where it is defined.
    fn goto_name(&self, name: Node<'_>) -> Result<Vec<Definition>, ResolutionError> {
        let Some(parent) = name.parent() else {
            return Ok(Vec::new());
        };
        let text = self.text(name);

        match parent.kind() {
            "attribute" if is_field(parent, "attribute", name) => {
                let Some(object) = parent.child_by_field_name("object") else {
                    return Ok(Vec::new());
                };
                let owner = self.infer_expr(object, 0)?;
                return Ok(self.member_of(&owner, text)?.into_iter().collect());
            },
            "dotted_name" => return self.goto_import_path(parent, name),
            "aliased_import" if is_field(parent, "alias", name) => {
                let Some(target) = parent.child_by_field_name("name") else {
                    return Ok(Vec::new());
                };
                let mut cursor = target.walk();
                let Some(last) = target.named_children(&mut cursor).last() else {
                    return Ok(Vec::new());
                };
                return self.goto_import_path(target, last);
            },
            "keyword_argument" if is_field(parent, "name", name) => return Ok(Vec::new()),
            _ => {},
        }

        if is_binding_site(name, parent) {
            return Ok(Vec::new());
        }

        return match self.lookup(name, text) {
            Some(Binding::Import(path)) => Ok(self.index.resolve(&path)?.into_iter().collect()),
            _ => Ok(Vec::new()),
        };
    }

    /// Resolve one segment of a dotted path inside an import statement.
    fn goto_import_path(&self, dotted: Node<'_>, name: Node<'_>) -> Result<Vec<Definition>, ResolutionError> {
        let mut parts = Vec::new();
        let mut cursor = dotted.walk();
        for part in dotted.named_children(&mut cursor) {
            parts.push(self.text(part));
            if part.id() == name.id() {
                break;
            }
        }
        let prefix = parts.join(".");

        let Some(statement) = ancestor_of_kind(dotted, &["import_statement", "import_from_statement"]) else {
            return Ok(Vec::new());
        };
        let path = if statement.kind() == "import_from_statement" {
            let Some(module_name) = statement.child_by_field_name("module_name") else {
                return Ok(Vec::new());
            };
            if module_name.id() == dotted.id() {
                prefix
            } else {
                let Some(base) = dotted_text(module_name, self.source) else {
                    // Relative imports have no meaning inside a documentation snippet.
                    return Ok(Vec::new());
                };
                format!("{base}.{prefix}")
            }
        } else {
            prefix
        };

        return Ok(self.index.resolve(&path)?.into_iter().collect());
    }

    // ── infer ─────────────────────────────────────────────────────────

    /// Evaluate an expression node.
    fn infer_expr(&self, node: Node<'_>, depth: u8) -> Result<Value, ResolutionError> {
        if depth > MAX_INFER_DEPTH {
            return Err(ResolutionError::TooDeep {
                name: self.text(node).to_string(),
            });
        }
        let next = depth.saturating_add(1);

        return match node.kind() {
            "identifier" => match self.lookup(node, self.text(node)) {
                Some(Binding::Import(path)) => Ok(self.index.resolve(&path)?.map_or(Value::Unknown, Value::Definition)),
                Some(Binding::Value(range)) => match self.node_for(&range) {
                    Some(expr) => self.infer_expr(expr, next),
                    None => Ok(Value::Unknown),
                },
                Some(Binding::Annotated(range)) => match self.node_for(&range) {
                    Some(annotation) => Ok(instance_of(self.infer_expr(annotation, next)?)),
                    None => Ok(Value::Unknown),
                },
                Some(Binding::Local | Binding::Star(_)) | None => Ok(Value::Unknown),
            },
            "attribute" => {
                let (Some(object), Some(attribute)) =
                    (node.child_by_field_name("object"), node.child_by_field_name("attribute"))
                else {
                    return Ok(Value::Unknown);
                };
                let owner = self.infer_expr(object, next)?;
                Ok(self.member_of(&owner, self.text(attribute))?.map_or(Value::Unknown, Value::Definition))
            },
            "call" => {
                let Some(function) = node.child_by_field_name("function") else {
                    return Ok(Value::Unknown);
                };
                match self.infer_expr(function, next)? {
                    Value::Definition(callee) => {
                        Ok(self.index.instance_class(&callee)?.map_or(Value::Unknown, Value::Instance))
                    },
                    Value::Instance(_) | Value::Unknown => Ok(Value::Unknown),
                }
            },
            "parenthesized_expression" | "type" | "await" => match node.named_child(0) {
                Some(inner) => self.infer_expr(inner, next),
                None => Ok(Value::Unknown),
            },
            _ => Ok(Value::Unknown),
        };
    }

    /// Look up an attribute on a module, class or instance.
    fn member_of(&self, owner: &Value, name: &str) -> Result<Option<Definition>, ResolutionError> {
        return match owner {
            Value::Definition(d) if matches!(d.kind, DefinitionKind::Module | DefinitionKind::Class) => {
                self.index.member(d, name)
            },
            Value::Instance(class) => self.index.member(class, name),
            Value::Definition(_) | Value::Unknown => Ok(None),
        };
    }

    // ── Scopes ────────────────────────────────────────────────────────

    /// Find the binding visible at `reference` for `name`, innermost scope
    /// first.
    fn lookup(&self, reference: Node<'_>, name: &str) -> Option<Binding> {
        let position = reference.start_byte();
        for scope in scope_chain(reference) {
            let bindings = self.bindings_of(scope);
            let Some(candidates) = bindings.get(name) else {
                if let Some(binding) = self.star_import(&bindings, name, position) {
                    return Some(binding);
                }
                continue;
            };
            let visible = candidates
                .iter()
                .rev()
                .find(|(at, _)| return *at <= position)
                .or_else(|| return candidates.first());
            if let Some((_, binding)) = visible {
                return Some(binding.clone());
            }
        }
        return None;
    }

    /// Resolve `name` through the star imports of one scope, latest first.
    fn star_import(&self, bindings: &ScopeBindings, name: &str, position: usize) -> Option<Binding> {
        let stars = bindings.get(STAR_IMPORTS)?;
        return stars
            .iter()
            .rev()
            .filter(|(at, _)| return *at <= position)
            .find_map(|(_, binding)| {
                let Binding::Star(module) = binding else {
                    return None;
                };
                let path = format!("{module}.{name}");
                let found = self.index.resolve(&path).ok().flatten();
                return found.map(|_| return Binding::Import(path));
            });
    }

    /// Bindings of one scope node, collected once and cached.
    fn bindings_of(&self, scope: Node<'_>) -> Rc<ScopeBindings> {
        if let Some(cached) = self.scopes.borrow().get(&scope.id()) {
            return Rc::clone(cached);
        }

        let mut bindings = ScopeBindings::new();
        if let Some(parameters) = scope.child_by_field_name("parameters") {
            self.collect_parameters(parameters, scope.start_byte(), &mut bindings);
        }
        let body = match scope.kind() {
            "module" => Some(scope),
            _ => scope.child_by_field_name("body"),
        };
        if let Some(body) = body {
            self.collect_bindings(body, &mut bindings);
        }

        let bindings = Rc::new(bindings);
        self.scopes.borrow_mut().insert(scope.id(), Rc::clone(&bindings));
        return bindings;
    }

    /// Walk a scope body, recording bindings without entering nested scopes.
    fn collect_bindings(&self, node: Node<'_>, out: &mut ScopeBindings) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            let at = child.end_byte();
            match child.kind() {
                "function_definition" | "class_definition" => {
                    if let Some(name) = child.child_by_field_name("name") {
                        bind(out, self.text(name), at, Binding::Local);
                    }
                    continue;
                },
                "lambda" => continue,
                "import_statement" => self.collect_import(child, out),
                "import_from_statement" => self.collect_import_from(child, out),
                "assignment" => self.collect_assignment(child, out),
                "for_statement" | "for_in_clause" => {
                    if let Some(left) = child.child_by_field_name("left") {
                        self.bind_locals(left, at, out);
                    }
                },
                "as_pattern_target" => self.bind_locals(child, at, out),
                "named_expression" => {
                    let name = child.child_by_field_name("name");
                    let value = child.child_by_field_name("value");
                    if let (Some(name), Some(value)) = (name, value) {
                        bind(out, self.text(name), at, Binding::Value(value.byte_range()));
                    }
                },
                _ => {},
            }
            self.collect_bindings(child, out);
        }
    }

    /// Record `x = value`, `x: T = value` and tuple targets.
    fn collect_assignment(&self, node: Node<'_>, out: &mut ScopeBindings) {
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        let at = node.end_byte();
        if left.kind() != "identifier" {
            self.bind_locals(left, at, out);
            return;
        }
        let binding = match (node.child_by_field_name("type"), node.child_by_field_name("right")) {
            (Some(annotation), _) => Binding::Annotated(annotation.byte_range()),
            (None, Some(right)) if right.kind() != "assignment" => Binding::Value(right.byte_range()),
            _ => Binding::Local,
        };
        bind(out, self.text(left), at, binding);
    }

    /// Record `import a.b` (binds `a`) and `import a.b as c` (binds `c`).
    fn collect_import(&self, node: Node<'_>, out: &mut ScopeBindings) {
        let at = node.end_byte();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "dotted_name" => {
                    if let Some(first) = child.named_child(0) {
                        let first = self.text(first);
                        bind(out, first, at, Binding::Import(first.to_string()));
                    }
                },
                "aliased_import" => {
                    let target = child.child_by_field_name("name").and_then(|n| return dotted_text(n, self.source));
                    if let (Some(target), Some(alias)) = (target, child.child_by_field_name("alias")) {
                        bind(out, self.text(alias), at, Binding::Import(target));
                    }
                },
                _ => {},
            }
        }
    }

    /// Record `from m import a, b as c` and `from m import *`. Relative
    /// imports bind locals.
    fn collect_import_from(&self, node: Node<'_>, out: &mut ScopeBindings) {
        let at = node.end_byte();
        let base = node
            .child_by_field_name("module_name")
            .filter(|m| return m.kind() == "dotted_name")
            .and_then(|m| return dotted_text(m, self.source));

        let mut wildcard = node.walk();
        let is_star = node.named_children(&mut wildcard).any(|c| return c.kind() == "wildcard_import");
        if let Some(base) = base.as_ref().filter(|_| return is_star) {
            bind(out, STAR_IMPORTS, at, Binding::Star(base.clone()));
            return;
        }

        let mut cursor = node.walk();
        for name_node in node.children_by_field_name("name", &mut cursor) {
            let (imported, bound) = if name_node.kind() == "aliased_import" {
                (name_node.child_by_field_name("name"), name_node.child_by_field_name("alias"))
            } else {
                (Some(name_node), Some(name_node))
            };
            let imported = imported.and_then(|n| return dotted_text(n, self.source));
            let (Some(imported), Some(bound)) = (imported, bound) else {
                continue;
            };
            let binding = match &base {
                Some(base) => Binding::Import(format!("{base}.{imported}")),
                None => Binding::Local,
            };
            bind(out, self.text(bound), at, binding);
        }
    }

    /// Record parameters of a function or lambda. They take effect at the
    /// start of the scope.
    fn collect_parameters(&self, parameters: Node<'_>, at: usize, out: &mut ScopeBindings) {
        let mut cursor = parameters.walk();
        for parameter in parameters.named_children(&mut cursor) {
            match parameter.kind() {
                "identifier" => bind(out, self.text(parameter), at, Binding::Local),
                "typed_parameter" => {
                    let name = parameter.named_child(0).filter(|n| return n.kind() == "identifier");
                    let binding = parameter
                        .child_by_field_name("type")
                        .map_or(Binding::Local, |t| return Binding::Annotated(t.byte_range()));
                    if let Some(name) = name {
                        bind(out, self.text(name), at, binding);
                    }
                },
                "typed_default_parameter" | "default_parameter" => {
                    let binding = parameter
                        .child_by_field_name("type")
                        .map_or(Binding::Local, |t| return Binding::Annotated(t.byte_range()));
                    if let Some(name) = parameter.child_by_field_name("name") {
                        bind(out, self.text(name), at, binding);
                    }
                },
                _ => self.bind_locals(parameter, at, out),
            }
        }
    }

    /// Bind every identifier inside a target pattern as a local.
    fn bind_locals(&self, target: Node<'_>, at: usize, out: &mut ScopeBindings) {
        if target.kind() == "identifier" {
            bind(out, self.text(target), at, Binding::Local);
            return;
        }
        if target.kind() == "attribute" || target.kind() == "subscript" {
            return;
        }
        let mut cursor = target.walk();
        for child in target.named_children(&mut cursor) {
            self.bind_locals(child, at, out);
        }
    }

    // ── Helpers ───────────────────────────────────────────────────────

    /// The identifier under the cursor, also accepting a cursor placed just
    /// past the end of a name.
    fn name_at(&self, line: usize, column: usize) -> Result<Node<'_>, ResolutionError> {
        let root = self.tree.root_node();
        let row = line.checked_sub(1).ok_or(ResolutionError::NoName { column, line })?;
        let mut columns = vec![column];
        if let Some(before) = column.checked_sub(1) {
            columns.push(before);
        }
        for col in columns {
            let point = Point::new(row, col);
            let found = root.descendant_for_point_range(point, point);
            if let Some(node) = found.filter(|n| return n.kind() == "identifier") {
                return Ok(node);
            }
        }
        return Err(ResolutionError::NoName { column, line });
    }

    /// Re-find an expression node from its byte range.
    fn node_for(&self, range: &Range<usize>) -> Option<Node<'_>> {
        return self.tree.root_node().named_descendant_for_byte_range(range.start, range.end);
    }

    /// Source text of a node; empty on invalid UTF-8 boundaries.
    fn text(&self, node: Node<'_>) -> &'a str {
        return node_text(node, self.source).unwrap_or_default();
    }
}

/// Push a binding for `name`.
fn bind(out: &mut ScopeBindings, name: &str, at: usize, binding: Binding) {
    out.entry(name.to_string()).or_default().push((at, binding));
}

/// Nearest ancestor whose kind is one of `kinds`.
fn ancestor_of_kind<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    let mut current = node.parent();
    while let Some(candidate) = current {
        if kinds.contains(&candidate.kind()) {
            return Some(candidate);
        }
        current = candidate.parent();
    }
    return None;
}

/// An annotation evaluating to a class describes an instance of it.
fn instance_of(value: Value) -> Value {
    return match value {
        Value::Definition(d) if d.kind == DefinitionKind::Class => Value::Instance(d),
        _ => Value::Unknown,
    };
}

/// Whether a name node sits where a binding is introduced rather than used.
fn is_binding_site(name: Node<'_>, parent: Node<'_>) -> bool {
    return match parent.kind() {
        "function_definition" | "class_definition" => is_field(parent, "name", name),
        "assignment" | "augmented_assignment" | "for_statement" | "for_in_clause" => is_field(parent, "left", name),
        "default_parameter" | "typed_default_parameter" => is_field(parent, "name", name),
        "named_expression" => is_field(parent, "name", name),
        "parameters" | "lambda_parameters" | "typed_parameter" | "list_splat_pattern" | "dictionary_splat_pattern"
        | "pattern_list" | "tuple_pattern" | "list_pattern" | "as_pattern_target" | "global_statement"
        | "nonlocal_statement" => true,
        _ => false,
    };
}

/// Whether `child` is the node stored under `field` of `parent`.
fn is_field(parent: Node<'_>, field: &str, child: Node<'_>) -> bool {
    return parent.child_by_field_name(field).is_some_and(|f| return f.id() == child.id());
}

/// Scopes visible from a reference, innermost first, ending at the module.
/// A class body is only visible to statements directly inside it.
fn scope_chain(reference: Node<'_>) -> Vec<Node<'_>> {
    let mut chain = Vec::new();
    let mut current = reference.parent();
    let mut root = reference;
    while let Some(node) = current {
        match node.kind() {
            "function_definition" | "lambda" => chain.push(node),
            "class_definition" if chain.is_empty() => chain.push(node),
            _ => {},
        }
        root = node;
        current = node.parent();
    }
    chain.push(root);
    return chain;
}
