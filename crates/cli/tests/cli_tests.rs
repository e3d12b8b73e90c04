//! CLI integration tests
use predicates::prelude::*;
use tempfile::TempDir;

fn cmd(store: &TempDir) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("gleaner");
    cmd.env_remove("GLEANER_MASTER_KEY").env_remove("RUST_LOG").arg("--store").arg(store.path());
    cmd
}

fn get_fixture_path(name: &str) -> String {
    format!("../../tests/fixtures/{}", name)
}

fn article() -> String {
    get_fixture_path("news_article.html")
}

#[test]
fn test_cli_file_input() {
    let store = TempDir::new().unwrap();
    cmd(&store)
        .args(["extract", &article()])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("<h1>City Council Approves New Riverside Park</h1>"));
}

#[test]
fn test_cli_stdin_input() {
    let store = TempDir::new().unwrap();
    let html = std::fs::read_to_string(article()).unwrap();
    cmd(&store)
        .args(["extract", "-", "--url", "https://harbordaily.example/local/riverside-park"])
        .write_stdin(html)
        .assert()
        .success()
        .stdout(predicate::str::contains("abandoned rail yard"));
}

#[test]
fn test_cli_text_format() {
    let store = TempDir::new().unwrap();
    cmd(&store)
        .args(["extract", "-f", "text", &article()])
        .assert()
        .success()
        .stdout(predicate::str::contains("restored wetland"))
        .stdout(predicate::str::contains("<p>").not());
}

#[test]
fn test_cli_json_format() {
    let store = TempDir::new().unwrap();
    let output = cmd(&store).args(["extract", "-f", "json", &article()]).output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["title"], "City Council Approves New Riverside Park");
    assert_eq!(json["byline"], "Jane Rivera");
    assert!(json["length"].as_u64().unwrap() > 250);
}

#[test]
fn test_cli_output_file() {
    let store = TempDir::new().unwrap();
    let output = store.path().join("article.html");

    cmd(&store)
        .args(["extract", "-o", output.to_str().unwrap(), &article()])
        .assert()
        .success();

    assert!(std::fs::read_to_string(output).unwrap().contains("abandoned rail yard"));
}

#[test]
fn test_cli_proxy_rewrite() {
    let store = TempDir::new().unwrap();
    cmd(&store)
        .args([
            "extract",
            "--url",
            "https://harbordaily.example/local/riverside-park",
            "--proxy",
            "http://127.0.0.1:7000/proxy",
            &article(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://127.0.0.1:7000/proxy?url=https%3A%2F%2Fharbordaily.example"));
}

#[test]
fn test_cli_invalid_file() {
    let store = TempDir::new().unwrap();
    cmd(&store).args(["extract", "nonexistent.html"]).assert().failure();
}

#[test]
fn test_cli_empty_content() {
    let store = TempDir::new().unwrap();
    cmd(&store).args(["extract", &get_fixture_path("empty_content.html")]).assert().failure();
}

#[test]
fn test_cli_selector_mode_requires_rules() {
    let store = TempDir::new().unwrap();
    cmd(&store)
        .args(["extract", "--mode", "selectors", "--feed", "harbor", &article()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No selector rules"));
}

#[test]
fn test_cli_selector_workflow() {
    let store = TempDir::new().unwrap();
    cmd(&store)
        .args(["selector", "add", "--feed", "harbor", "article"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^[0-9a-f]{16}\n$").unwrap());
    cmd(&store).args(["selector", "add", "--feed", "harbor", "--exclude", ".author-bio"]).assert().success();

    cmd(&store)
        .args(["selector", "list", "--feed", "harbor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0\t+\tarticle"))
        .stdout(predicate::str::contains("1\t-\t.author-bio"));

    cmd(&store)
        .args(["extract", "--mode", "selectors", "--feed", "harbor", &article()])
        .assert()
        .success()
        .stdout(predicate::str::contains("restored wetland"))
        .stdout(predicate::str::contains("By Jane Rivera").not());

    cmd(&store).args(["selector", "list"]).assert().success().stdout("harbor\n");
}

#[test]
fn test_cli_invalid_selector_rejected() {
    let store = TempDir::new().unwrap();
    cmd(&store).args(["selector", "add", "--feed", "harbor", "[["]).assert().failure();
}

#[test]
fn test_cli_remove_unknown_rule() {
    let store = TempDir::new().unwrap();
    cmd(&store).args(["selector", "remove", "--feed", "harbor", "0123456789abcdef"]).assert().failure();
}

#[test]
fn test_cli_auth_password_encrypted() {
    let store = TempDir::new().unwrap();
    cmd(&store)
        .args([
            "auth",
            "set",
            "--feed",
            "harbor",
            "--login-url",
            "https://harbordaily.example/login",
            "--username",
            "ada",
            "--password",
            "hunter2",
            "--extra",
            "authenticity_token=",
            "--master-key",
            "correct horse",
        ])
        .assert()
        .success();

    let blob = std::fs::read_to_string(store.path().join("feeds.json")).unwrap();
    assert!(!blob.contains("hunter2"));

    cmd(&store)
        .args(["auth", "show", "--feed", "harbor", "--master-key", "correct horse"])
        .assert()
        .success()
        .stdout(predicate::str::contains("extra\tauthenticity_token=<from login page>"))
        .stdout(predicate::str::contains("unlocks with this master key"));

    cmd(&store)
        .args(["auth", "show", "--feed", "harbor", "--master-key", "wrong"])
        .assert()
        .success()
        .stdout(predicate::str::contains("locked"));

    cmd(&store).args(["auth", "clear", "--feed", "harbor"]).assert().success();
    cmd(&store)
        .args(["auth", "show", "--feed", "harbor"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_cli_completions() {
    let store = TempDir::new().unwrap();
    cmd(&store)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gleaner"));
}

#[test]
fn test_cli_verbose() {
    let store = TempDir::new().unwrap();
    cmd(&store)
        .args(["-v", "extract", &article()])
        .assert()
        .success()
        .stderr(predicate::str::contains("Gleaner"));
}
