//! Version-control metadata: commit, remote and repository root.

use std::path::{Path, PathBuf};
use std::process::Command;

/// The three questions the heading linker asks the VCS. Every answer is
/// optional; callers fall back to defaults.
pub trait Vcs {
    /// Short hash of the checked-out commit.
    fn current_commit(&self) -> Option<String>;
    /// URL of the `origin` remote, as configured.
    fn remote_url(&self) -> Option<String>;
    /// Top-level directory of the working tree.
    fn repo_root(&self) -> Option<PathBuf>;
}

/// Git, queried through the `git` executable.
#[derive(Debug, Clone)]
pub struct Git {
    /// Directory commands run in.
    dir: PathBuf,
}

impl Git {
    /// Query the repository containing `dir`.
    pub fn new(dir: &Path) -> Self {
        return Self { dir: dir.to_path_buf() };
    }

    /// Run `git <args>` and return trimmed stdout on success.
    fn query(&self, args: &[&str]) -> Option<String> {
        let output = match Command::new("git").args(args).current_dir(&self.dir).output() {
            Ok(output) => output,
            Err(e) => {
                log::warn!("failed to run git {}: {e}", args.join(" "));
                return None;
            },
        };
        if !output.status.success() {
            log::debug!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return None;
        }
        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        return (!text.is_empty()).then_some(text);
    }
}

impl Vcs for Git {
    fn current_commit(&self) -> Option<String> {
        return self.query(&["rev-parse", "--short", "HEAD"]);
    }

    fn remote_url(&self) -> Option<String> {
        return self.query(&["remote", "get-url", "origin"]);
    }

    fn repo_root(&self) -> Option<PathBuf> {
        return self.query(&["rev-parse", "--show-toplevel"]).map(PathBuf::from);
    }
}

/// Turn a remote URL into the repository's web URL: SSH forms become HTTPS,
/// a trailing `.git` and trailing slashes are dropped.
pub fn normalize_repo_url(url: &str) -> String {
    let url = url.trim();
    let web = if let Some(rest) = url.strip_prefix("ssh://") {
        let rest = rest.split_once('@').map_or(rest, |(_, host_path)| return host_path);
        format!("https://{rest}")
    } else if let Some(rest) = url.strip_prefix("git@") {
        format!("https://{}", rest.replacen(':', "/", 1))
    } else {
        url.to_string()
    };
    let web = web.trim_end_matches('/');
    let web = web.strip_suffix(".git").unwrap_or(web);
    return web.trim_end_matches('/').to_string();
}
