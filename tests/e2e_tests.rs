//! End-to-end CLI tests for docu.
//!
//! These tests run the binary against an isolated config and data directory.
//! Docsets are crawled from a loopback HTTP stub.

mod common;

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

use common::{Route, StubServer, docset_config, widget_page_a, widget_page_b};

// =============================================================================
// Test Environment Helper
// =============================================================================

/// Isolated test environment with its own config and data directory.
struct TestEnv {
    temp_dir: TempDir,
    data_dir: PathBuf,
    config_path: PathBuf,
    _server: Option<StubServer>,
}

impl TestEnv {
    /// Environment with only the built-in catalog.
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let data_dir = temp_dir.path().join("data");
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, docset_config(&data_dir, &[])).expect("Failed to write config");

        Self {
            temp_dir,
            data_dir,
            config_path,
            _server: None,
        }
    }

    /// Environment with a `demo` docset served from a local stub.
    fn with_demo_docset() -> Self {
        let mut env = Self::new();
        let server = StubServer::start(vec![
            ("/a", Route::Html(widget_page_a())),
            ("/b", Route::Html(widget_page_b())),
        ]);

        let config = docset_config(&env.data_dir, &[("demo", vec![server.url("/a"), server.url("/b")])]);
        fs::write(&env.config_path, config).expect("Failed to write config");

        env._server = Some(server);
        env
    }

    /// Get a Command configured for this test environment.
    fn command(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("docu");
        cmd.env("DOCU_CONFIG", &self.config_path);
        cmd.env("DOCU_DATA_DIR", &self.data_dir);
        cmd.env("RUST_LOG", "docu=warn");
        cmd
    }

    /// A path inside this environment's temp dir.
    fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    fn fetch_demo(&self) {
        self.command()
            .args(["fetch", "demo"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Fetched demo: 2 documents"));
    }
}

// =============================================================================
// 1. Help / No Command Tests
// =============================================================================

#[test]
fn tc_1_1_no_subcommand_shows_help() {
    let env = TestEnv::new();

    env.command()
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("available"));
}

#[test]
fn tc_1_2_version_flag() {
    TestEnv::new()
        .command()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

// =============================================================================
// 2. Catalog and Listing
// =============================================================================

#[test]
fn tc_2_1_available_lists_builtin_catalog() {
    TestEnv::new()
        .command()
        .arg("available")
        .assert()
        .success()
        .stdout(predicate::str::contains("react"))
        .stdout(predicate::str::contains("python"))
        .stdout(predicate::str::contains("[installed]").not());
}

#[test]
fn tc_2_2_list_with_nothing_installed() {
    TestEnv::new()
        .command()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No docsets installed"));
}

#[test]
fn tc_2_3_malformed_config_fails() {
    let env = TestEnv::new();
    fs::write(&env.config_path, "data_dir = [").unwrap();

    env.command()
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config"));
}

// =============================================================================
// 3. Usage Errors
// =============================================================================

#[test]
fn tc_3_1_empty_query_is_rejected() {
    TestEnv::new()
        .command()
        .args(["search", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be empty"));
}

#[test]
fn tc_3_2_search_with_nothing_installed() {
    TestEnv::new()
        .command()
        .args(["search", "hooks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No results found for 'hooks'"));
}

#[test]
fn tc_3_3_fetch_unknown_docset() {
    TestEnv::new()
        .command()
        .args(["fetch", "no-such-docs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown docset 'no-such-docs'"))
        .stderr(predicate::str::contains("react"));
}

#[test]
fn tc_3_4_remove_not_installed() {
    TestEnv::new()
        .command()
        .args(["remove", "react"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not installed"));
}

#[test]
fn tc_3_5_missing_query_argument() {
    TestEnv::new()
        .command()
        .arg("search")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

// =============================================================================
// 4. Fetch / Search / Remove Workflow
// =============================================================================

#[test]
fn tc_4_1_fetch_then_search() {
    let env = TestEnv::with_demo_docset();
    env.fetch_demo();

    env.command()
        .args(["search", "widget api"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Widget Basics"))
        .stdout(predicate::str::contains("Creating Widgets"))
        .stdout(predicate::str::contains("[demo]"))
        .stdout(predicate::str::contains("**API**"))
        .stdout(predicate::str::contains("2 result(s) found"));
}

#[test]
fn tc_4_2_fetch_twice_requires_force() {
    let env = TestEnv::with_demo_docset();
    env.fetch_demo();

    env.command()
        .args(["fetch", "demo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already installed"));

    env.command()
        .args(["fetch", "demo", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Fetched demo: 2 documents"));
}

#[test]
fn tc_4_3_list_and_available_show_install() {
    let env = TestEnv::with_demo_docset();
    env.fetch_demo();

    env.command()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("demo"))
        .stdout(predicate::str::contains("2 docs"))
        .stdout(predicate::str::contains("fetched today"));

    env.command()
        .arg("available")
        .assert()
        .success()
        .stdout(predicate::str::contains("[installed]"));
}

#[test]
fn tc_4_4_search_limit_and_docset_filter() {
    let env = TestEnv::with_demo_docset();
    env.fetch_demo();

    env.command()
        .args(["search", "widget", "--limit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 result(s) found"));

    env.command()
        .args(["search", "widget", "--docset", "react"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No results found"));
}

#[test]
fn tc_4_5_update_check_reports_fresh_docset() {
    let env = TestEnv::with_demo_docset();
    env.fetch_demo();

    env.command()
        .args(["update", "--all", "--check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("demo"))
        .stdout(predicate::str::contains("up to date"));

    env.command()
        .args(["update", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Fetched demo: 2 documents"));
}

#[test]
fn tc_4_6_remove_docset() {
    let env = TestEnv::with_demo_docset();
    env.fetch_demo();

    env.command()
        .args(["remove", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed docset: demo"));

    env.command()
        .args(["search", "widget"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No results found"));

    assert!(!env.data_dir.join("index").join("demo").exists());
}

#[test]
fn tc_4_7_fetch_with_unreachable_pages_fails() {
    let env = TestEnv::new();
    let config = docset_config(&env.data_dir, &[("offline", vec![common::refused_url()])]);
    fs::write(&env.config_path, config).unwrap();

    env.command()
        .args(["fetch", "offline"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No documents extracted"));

    env.command()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No docsets installed"));
}

// =============================================================================
// 5. Export
// =============================================================================

#[test]
fn tc_5_1_export_markdown() {
    let env = TestEnv::with_demo_docset();
    env.fetch_demo();
    let output = env.path("exports/widgets.md");

    env.command()
        .args(["export", "widget api", "-o"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 result(s)"))
        .stdout(predicate::str::contains("Format: markdown"));

    let written = fs::read_to_string(&output).unwrap();
    assert!(written.starts_with("# Search Results for \"widget api\""));
    assert!(written.contains("**Total Results:** 2"));
    assert!(written.contains("## 1. "));
    assert!(written.contains("**API**"));
}

#[test]
fn tc_5_2_export_json() {
    let env = TestEnv::with_demo_docset();
    env.fetch_demo();
    let output = env.path("widgets.json");

    env.command()
        .args(["export", "widget", "-f", "json", "-d", "demo", "-o"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Format: json"));

    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(value["query"], "widget");
    assert_eq!(value["docset"], "demo");
    assert_eq!(value["total"], 2);
    assert_eq!(value["results"].as_array().unwrap().len(), 2);
    assert_eq!(value["results"][0]["docset"], "demo");
}

#[test]
fn tc_5_3_export_txt_with_limit() {
    let env = TestEnv::with_demo_docset();
    env.fetch_demo();
    let output = env.path("widgets.txt");

    env.command()
        .args(["export", "widget", "--format", "txt", "--limit", "1", "--output"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 1 result(s)"));

    let written = fs::read_to_string(&output).unwrap();
    assert!(written.contains("Total Results: 1"));
    assert!(written.contains("Docset: demo"));
    assert!(!written.contains("**"));
}

#[test]
fn tc_5_4_export_without_results_writes_nothing() {
    let env = TestEnv::with_demo_docset();
    env.fetch_demo();
    let output = env.path("nothing.md");

    env.command()
        .args(["export", "nonexistentterm", "-o"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("No results found for 'nonexistentterm'"));

    assert!(!output.exists());
}
