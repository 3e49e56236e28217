use crate::config::CONFIG_FILE;
use crate::error::Error;

/// ANSI escape that starts bold text.
const BOLD: &str = "\x1b[1m";
/// ANSI escape that resets text attributes.
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where the user can
/// act on it, how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::InvalidPattern { pattern, reason, setting } => render_invalid_pattern(pattern, reason, setting),
        Error::MissingRepoUrl { heading } => render_missing_repo_url(heading),
        Error::SiteNotFound { path } => format!(
            "\
# Error: Site Not Found

`{}` does not exist.

## Fix

Render the documentation first, then point `build` at its output directory:

    clickable-code build site
",
            path.display()
        ),
        Error::SourceTooLarge { file, max_bytes, size_bytes } => format!(
            "\
# Error: Source Too Large

`{}` is {size_bytes} bytes (max {max_bytes}).

## Fix

Narrow `sources` in `{CONFIG_FILE}` so generated or vendored files are not indexed.
",
            file.display()
        ),
        _ => render_generic(e),
    };
}

/// Variants that carry nothing beyond their message.
fn render_generic(e: &Error) -> String {
    return match e {
        Error::Io(e) => format!(
            "\
# Error: I/O

{e}
"
        ),
        Error::Json(e) => format!(
            "\
# Error: JSON Serialization

{e}
"
        ),
        Error::MalformedFragment { offset, reason } => format!(
            "\
# Error: Malformed Code Fragment

The code block at byte {offset} could not be read back: {reason}
"
        ),
        Error::ParseFailed { file, reason } => format!(
            "\
# Error: Parse Failed

Could not parse `{}`: {reason}
",
            file.display()
        ),
        Error::TomlDe(e) => format!(
            "\
# Error: Invalid TOML

`{CONFIG_FILE}` is malformed:

{e}
"
        ),
        _ => format!(
            "\
# Error

{e}
"
        ),
    };
}

/// A heading pattern or prefix the config rejected.
fn render_invalid_pattern(pattern: &str, reason: &str, setting: &str) -> String {
    return format!(
        "\
# Error: Invalid Pattern

`{setting}` in `{CONFIG_FILE}` is set to `{pattern}`, which is rejected:

{reason}

## Fix

Use a valid regular expression for `pattern`, or a Python identifier for
`qualified_prefix`.
"
    );
}

/// A heading needed a repository URL and none was available.
fn render_missing_repo_url(heading: &str) -> String {
    return format!(
        "\
# Error: Missing Repository URL

Heading `{heading}` resolved to a source line, but there is no repository to link to.

## Fix

Set the URL in `{CONFIG_FILE}`:

    repo_url = \"https://github.com/org/repo\"

Or add a git remote:

    git remote add origin https://github.com/org/repo
"
    );
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn missing_repo_url_names_heading_and_fixes() {
        let md = render_error(&Error::MissingRepoUrl {
            heading: "demo_package.math.add".to_string(),
        });
        assert!(md.starts_with("# Error: Missing Repository URL"));
        assert!(md.contains("`demo_package.math.add`"));
        assert!(md.contains("repo_url = \"https://github.com/org/repo\""));
    }

    #[test]
    fn invalid_pattern_names_setting() {
        let md = render_error(&Error::InvalidPattern {
            pattern: "(unclosed".to_string(),
            reason: "unclosed group".to_string(),
            setting: "pattern",
        });
        assert!(md.contains("`pattern` in `.clickable-code.toml` is set to `(unclosed`"));
        assert!(md.contains("unclosed group"));
    }

    #[test]
    fn every_block_starts_with_heading() {
        let errors = [
            Error::SiteNotFound {
                path: PathBuf::from("site"),
            },
            Error::MalformedFragment {
                offset: 12,
                reason: "no code element".to_string(),
            },
            Error::Io(std::io::Error::other("disk full")),
        ];
        for e in &errors {
            assert!(render_error(e).starts_with("# Error"));
        }
    }
}
