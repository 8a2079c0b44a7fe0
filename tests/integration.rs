use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn vqa_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("vqa");
    path
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let vault = root.join("vault");
    write(
        &vault,
        "GS1DK Services Index.md",
        "# GS1DK Services Index\n## Services\n- [[GS1 Basis|Basis abonnement]]\n- [Billedpakker](services/Image%20Packs.md)\n- Ghost -> Missing Note.md\n",
    );
    write(
        &vault,
        "services/GS1 Basis.md",
        "# GS1 Basis\nGrundlæggende medlemskab.\n\n## Priser\nBasic package: 500 kr\n",
    );
    write(
        &vault,
        "services/Image Packs.md",
        "# Image Packs\n## Pakker\n| Pakke | Pris |\n|-------|------|\n| Small | 1.200 kr |\n| Large | 2.400 kr |\n",
    );
    write(
        &vault,
        "GS1DK Brancher Index.md",
        "# Brancher\n## Pages\n- Retail: 12\n- Healthcare: 7\n",
    );
    write(&vault, "misc/Office.md", "# Office\nThe office is in Copenhagen.\n");
    write(&vault, ".obsidian/workspace.md", "# Workspace\n");

    let config_content = format!(
        r#"[vault]
root = "{}"
include_globs = ["**/*.md"]

[retrieval]
top_n = 5

[formatter]
backend = "disabled"

[server]
bind = "127.0.0.1:0"
"#,
        vault.display()
    );

    let config_path = config_dir.join("vqa.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_vqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    run_vqa_with_env(config_path, args, None)
}

fn run_vqa_with_env(
    config_path: &Path,
    args: &[&str],
    vault_path: Option<&Path>,
) -> (String, String, bool) {
    let binary = vqa_binary();
    let mut cmd = Command::new(&binary);
    cmd.arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("VAULT_PATH")
        .env("RUST_LOG", "warn");
    if let Some(vault) = vault_path {
        cmd.env("VAULT_PATH", vault);
    }
    let output = cmd
        .output()
        .unwrap_or_else(|e| panic!("Failed to run vqa binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_index_prints_stats_and_warnings() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_vqa(&config_path, &["index"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Notes:       5"), "{}", stdout);
    assert!(stdout.contains("Services index: GS1DK Services Index.md"));
    assert!(stdout.contains("Count index:    GS1DK Brancher Index.md#Pages"));
    assert!(stdout.contains("Missing Note"), "unresolved entry warning: {}", stdout);
    assert!(!stdout.contains("Workspace"));
}

#[test]
fn test_ask_price_lists_table_items_with_sources() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_vqa(&config_path, &["ask", "Hvad koster billedpakker?"]);
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("- Small: 1.200 kr"));
    assert!(stdout.contains("- Large: 2.400 kr"));
    assert!(stdout.contains("Sources:\n- services/Image Packs.md#Pakker"));
}

#[test]
fn test_ask_unknown_returns_not_found_literal() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_vqa(&config_path, &["ask", "What is the airspeed of a swallow?"]);
    assert!(success);
    assert_eq!(stdout.trim(), "I can't find that in the vault.");
}

#[test]
fn test_ask_identity() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_vqa(&config_path, &["ask", "Who are you?"]);
    assert!(success);
    assert_eq!(
        stdout.trim(),
        "Jeg hedder Dory, jeg er din digitale praktikant."
    );
}

#[test]
fn test_ask_count() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_vqa(&config_path, &["ask", "Hvor mange brancher er der?"]);
    assert!(success, "ask failed: {}", stderr);
    assert!(stdout.contains("- Retail: 12\n- Healthcare: 7"), "{}", stdout);
    assert!(stdout.contains("GS1DK Brancher Index.md#Pages"));
}

#[test]
fn test_search_ranks_sections() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_vqa(&config_path, &["search", "office copenhagen"]);
    assert!(success);
    let first = stdout.lines().next().unwrap_or_default();
    assert!(first.starts_with("1. ["), "{}", stdout);
    assert!(first.contains("misc/Office.md#Office"));

    let (stdout, _, success) = run_vqa(&config_path, &["search", "zebra"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_classify_json() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) =
        run_vqa(&config_path, &["classify", "--json", "Hvad koster Basis abonnement?"]);
    assert!(success);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["route"], "price");
    assert_eq!(value["class"]["is_price_query"], true);
    assert_eq!(value["class"]["references_known_term"], true);
}

#[test]
fn test_extract_json_carries_records_and_citations() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_vqa(&config_path, &["extract", "--json", "Basis abonnement pris"]);
    assert!(success);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["outcome"], "facts");
    assert_eq!(value["records"][0]["fields"]["kind"], "price-item");
    assert_eq!(value["records"][0]["fields"]["price"], "500 kr");
    assert_eq!(value["citations"][0]["file_path"], "services/GS1 Basis.md");
}

#[test]
fn test_note_shows_sections_and_aliases() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_vqa(&config_path, &["note", "services/GS1 Basis"]);
    assert!(success, "note failed: {}", stderr);
    assert!(stdout.contains("# GS1 Basis (primary)"));
    assert!(stdout.contains("lines:   1-3"));
    assert!(stdout.contains("basis abonnement"));

    let (_, stderr, success) = run_vqa(&config_path, &["note", "does-not-exist"]);
    assert!(!success);
    assert!(stderr.contains("note not found"));
}

#[test]
fn test_missing_vault_root_is_fatal() {
    let (tmp, config_path) = setup_test_env();

    let (_, stderr, success) =
        run_vqa_with_env(&config_path, &["index"], Some(&tmp.path().join("nowhere")));
    assert!(!success);
    assert!(stderr.contains("Vault root does not exist"));
}

#[test]
fn test_vault_path_env_overrides_root() {
    let (_tmp, config_path) = setup_test_env();
    let other = TempDir::new().unwrap();
    write(other.path(), "only.md", "# Only\nJust one note.\n");

    let (stdout, _, success) = run_vqa_with_env(&config_path, &["index"], Some(other.path()));
    assert!(success);
    assert!(stdout.contains("Notes:       1"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("vqa.toml");
    fs::write(
        &config_path,
        "[vault]\nroot = \".\"\n[formatter]\nbackend = \"telepathy\"\n",
    )
    .unwrap();

    let (_, stderr, success) = run_vqa(&config_path, &["index"]);
    assert!(!success);
    assert!(stderr.contains("Unknown formatter backend"));
}
