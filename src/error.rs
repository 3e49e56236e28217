/// Crate-level error types for clickable-code diagnostics.
use std::path::PathBuf;

/// Errors that stop a build. Each variant names the file, setting, or reason
/// for failure so the rendered diagnostic is actionable without a debugger.
///
/// Per-identifier and per-heading misses never surface here: they are either
/// silent skips or a [`ResolutionError`] consumed by the caller.
#[allow(clippy::error_impl_error, reason = "crate-level error type")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configured heading-id pattern or prefix is not a valid regex.
    #[error("invalid pattern `{pattern}` for `{setting}`: {reason}")]
    InvalidPattern {
        /// The rejected pattern text.
        pattern: String,
        /// Why the regex engine rejected it.
        reason: String,
        /// Config key that carried the pattern.
        setting: &'static str,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON serialization failed.
    #[error("json: {0}")]
    Json(
        /// The wrapped JSON error.
        #[from]
        serde_json::Error,
    ),

    /// A code fragment could not be turned back into a DOM tree.
    #[error("malformed code fragment at byte {offset}: {reason}")]
    MalformedFragment {
        /// Byte offset of the fragment in the page.
        offset: usize,
        /// Description of what was missing or broken.
        reason: String,
    },

    /// A heading resolved to a source line but there is no repository URL
    /// to point the link at.
    #[error(
        "no repository URL: set `repo_url` in .clickable-code.toml or add a git remote named `origin` (needed for heading `{heading}`)"
    )]
    MissingRepoUrl {
        /// Heading id that needed the URL.
        heading: String,
    },

    /// Tree-sitter failed to parse a source file.
    #[error("parse failed: {}: {reason}", file.display())]
    ParseFailed {
        /// File that failed to parse.
        file: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// The site directory passed to `build` does not exist.
    #[error("site directory not found: {}", path.display())]
    SiteNotFound {
        /// Path that was expected to hold the built site.
        path: PathBuf,
    },

    /// Source file exceeds the size limit for indexing.
    #[error("file too large ({size_bytes} bytes, max {max_bytes}): {}", file.display())]
    SourceTooLarge {
        /// File that exceeded the size limit.
        file: PathBuf,
        /// Maximum allowed file size in bytes.
        max_bytes: u64,
        /// Actual file size in bytes.
        size_bytes: u64,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),
}

/// Why a single identifier could not be resolved. Never fatal: the caller
/// skips the identifier and moves on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// The cursor does not sit on a name token.
    #[error("no name at {line}:{column}")]
    NoName {
        /// Zero-based byte column.
        column: usize,
        /// One-based line.
        line: usize,
    },

    /// Alias or assignment chains nest deeper than the inference limit.
    #[error("inference depth exceeded while resolving `{name}`")]
    TooDeep {
        /// Name whose resolution was abandoned.
        name: String,
    },

    /// The snippet could not be parsed at all.
    #[error("unparseable source: {reason}")]
    Unparseable {
        /// Description of the parse failure.
        reason: String,
    },
}
