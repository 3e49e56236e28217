/// Core domain types shared by the resolver, the code-block linker and the
/// heading linker.
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Where a symbol was defined and what it is. Produced by the symbol index
/// and handed out by value so pages never hold borrows into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Definition {
    /// Dotted path such as `demo_package.math.MovingAverage.update`.
    pub full_name: String,
    /// What kind of symbol this is.
    pub kind: DefinitionKind,
    /// One-based line of the definition, if known.
    pub line: Option<u32>,
    /// File holding the definition, if known.
    pub path: Option<PathBuf>,
}

impl Definition {
    /// Whether `full_name` equals `namespace` or lives under `namespace.`.
    /// An absent namespace accepts everything.
    pub fn is_within(&self, namespace: Option<&str>) -> bool {
        let Some(namespace) = namespace else {
            return true;
        };
        return self.full_name == namespace
            || self
                .full_name
                .strip_prefix(namespace)
                .is_some_and(|rest| return rest.starts_with('.'));
    }
}

/// Kind of a definition, mirroring the Python object model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionKind {
    /// A `class` statement.
    Class,
    /// A `def` statement, including methods.
    Function,
    /// A module or package.
    Module,
    /// A module-level, class-level or instance attribute binding.
    Variable,
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DefinitionKind::Class => "class",
            DefinitionKind::Function => "function",
            DefinitionKind::Module => "module",
            DefinitionKind::Variable => "variable",
        };
        return f.pad(label);
    }
}

/// An identifier occurrence in reconstructed page source, considered for
/// linking.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Zero-based byte column of the identifier start.
    pub column: usize,
    /// Definitions the resolver produced, in analyzer order.
    pub definitions: Vec<Definition>,
    /// Byte length of the identifier.
    pub len: usize,
    /// One-based line of the identifier.
    pub line: usize,
    /// Byte offset of the identifier in the reconstructed source.
    pub offset: usize,
}

impl Candidate {
    /// The definition this candidate links to: the first one inside the
    /// namespace of interest that is not a bare module.
    pub fn accepted(&self, namespace: Option<&str>) -> Option<&Definition> {
        return self
            .definitions
            .iter()
            .find(|d| return d.kind != DefinitionKind::Module && d.is_within(namespace));
    }
}

/// A documentation URL for a fully qualified name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    /// Name that was looked up.
    pub full_name: String,
    /// Where its documentation lives.
    pub url: String,
}
