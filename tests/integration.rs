use std::path::Path;
use std::process::Command;

fn clickable_cmd(fixture: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_clickable-code"));
    cmd.current_dir(Path::new("tests/fixtures").join(fixture));
    cmd
}

/// Copy the rendered fixture site into a fresh directory.
fn copy_site(to: &Path) {
    let from = Path::new("tests/fixtures/site");
    for entry in walkdir::WalkDir::new(from) {
        let entry = entry.unwrap();
        let target = to.join(entry.path().strip_prefix(from).unwrap());
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).unwrap();
        } else {
            std::fs::copy(entry.path(), &target).unwrap();
        }
    }
}

#[test]
fn build_links_site_in_place() {
    let site = tempfile::tempdir().unwrap();
    copy_site(site.path());

    let build = clickable_cmd("basic").arg("build").arg(site.path()).output().unwrap();
    assert!(
        build.status.success(),
        "build failed: {}",
        String::from_utf8_lossy(&build.stderr)
    );
    assert!(String::from_utf8_lossy(&build.stderr).contains("Linked 2 of 2 pages"));

    let home = std::fs::read_to_string(site.path().join("index.html")).unwrap();
    assert!(home.contains("<a href=\"reference/#demo_package.math.MovingAverage\">eds.average</a>"));
    assert!(home.contains("href=\"reference/#demo_package.math.MovingAverage\">MovingAverage</a>"));
    assert!(home.contains("href=\"reference/#demo_package.math.MovingAverage.update\">update</a>"));
    assert!(!home.contains(">avg</a>"));

    let reference = std::fs::read_to_string(site.path().join("reference/index.html")).unwrap();
    assert!(reference.contains("https://example.com/org/repo/blob/"));
    assert!(reference.contains("/demo_package/math.py#L6\" target=\"_blank\">[source]</a></h2>"));
    assert!(reference.contains("/demo_package/math.py#L10\" target=\"_blank\">[source]</a></h3>"));
    assert!(reference.contains("<h2 id=\"installation\">Installation</h2>"));
    assert!(site.path().join("clickable-code.css").is_file());

    let again = clickable_cmd("basic").arg("build").arg(site.path()).output().unwrap();
    assert!(again.status.success());
    assert!(String::from_utf8_lossy(&again.stderr).contains("Linked 0 of 2 pages"));
}

#[test]
fn page_prints_rewritten_html() {
    let output = clickable_cmd("basic")
        .args(["page", "../site/index.html", "--url", "/index.html", "--site", "../site"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "page failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("class=\"clickable-discrete-link\""));

    let untouched = std::fs::read_to_string("tests/fixtures/site/index.html").unwrap();
    assert!(!untouched.contains("clickable-discrete-link"));
}

#[test]
fn symbols_lists_definitions_as_json() {
    let output = clickable_cmd("basic").args(["symbols", "--json"]).output().unwrap();
    assert!(output.status.success());

    let definitions: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = definitions
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["full_name"].as_str())
        .collect();
    assert!(names.contains(&"demo_package.math.add"));
    assert!(names.contains(&"demo_package.math.MovingAverage.update"));
}

#[test]
fn info_reports_state_as_json() {
    let output = clickable_cmd("basic").args(["info", "--json"]).output().unwrap();
    assert!(output.status.success());

    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["current_state"]["config_found"], true);
    assert_eq!(info["current_state"]["repo_url"], "https://example.com/org/repo");
    assert_eq!(info["current_state"]["namespace"], "demo_package");
}

#[test]
fn invalid_config_exits_with_diagnostic() {
    let output = clickable_cmd("badconfig").args(["build", "site"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid Pattern"));
}

#[test]
fn missing_site_exits_with_diagnostic() {
    let output = clickable_cmd("basic").args(["build", "no-such-site"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Site Not Found"));
}
