use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn paperdesk_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_paperdesk"))
}

/// A base URL nothing listens on, so fetches fail fast without network.
fn dead_source_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/api/query", addr)
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    fs::write(
        root.join("papers.json"),
        r#"[
  {
    "title": "Scaling Laws for Neural Language Models",
    "text": "Scaling Laws for Neural Language Models. We study empirical scaling laws.",
    "pdf_link": "http://arxiv.org/pdf/2001.08361v1.pdf",
    "authors": ["Jared Kaplan", "Sam McCandlish"]
  },
  {
    "title": "Deep Residual Learning",
    "text": "Deep Residual Learning. Deeper networks are harder to train.",
    "pdf_link": "http://arxiv.org/pdf/1512.03385v1.pdf",
    "authors": ["Kaiming He"]
  }
]"#,
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/paperdesk.sqlite"

[source]
base_url = "{}"
batch_size = 5

[cache]
fetch_interval_secs = 3600

[server]
bind = "127.0.0.1:7341"
"#,
        root.display(),
        dead_source_url()
    );

    let config_path = config_dir.join("paperdesk.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_in(dir: &Path, config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = paperdesk_binary();
    let output = Command::new(&binary)
        .current_dir(dir)
        .env("RUST_LOG", "warn")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run paperdesk binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn run_paperdesk(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let root = config_path.parent().unwrap().parent().unwrap();
    run_in(root, config_path, args)
}

fn import_fixture(config_path: &Path) -> (String, String, bool) {
    let root = config_path.parent().unwrap().parent().unwrap();
    let file = root.join("papers.json");
    run_paperdesk(
        config_path,
        &["import", file.to_str().unwrap(), "--topic", " Deep Learning "],
    )
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_paperdesk(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data").join("paperdesk.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_paperdesk(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_paperdesk(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_topics_empty() {
    let (_tmp, config_path) = setup_test_env();
    run_paperdesk(&config_path, &["init"]);

    let (stdout, _, success) = run_paperdesk(&config_path, &["topics"]);
    assert!(success);
    assert!(stdout.contains("No topics yet."));
}

#[test]
fn test_import_and_topics() {
    let (_tmp, config_path) = setup_test_env();
    run_paperdesk(&config_path, &["init"]);

    let (stdout, stderr, success) = import_fixture(&config_path);
    assert!(success, "import failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Imported 2 documents into 'deep learning' (2 new, 0 already stored)"));

    let (stdout, _, success) = run_paperdesk(&config_path, &["topics"]);
    assert!(success);
    let row = stdout
        .lines()
        .find(|l| l.starts_with("deep learning"))
        .unwrap_or_else(|| panic!("topic row missing: {}", stdout));
    assert!(row.trim_end().ends_with('2'), "unexpected row: {}", row);
}

#[test]
fn test_import_idempotent_no_duplicates() {
    let (_tmp, config_path) = setup_test_env();
    run_paperdesk(&config_path, &["init"]);

    import_fixture(&config_path);
    let (stdout, _, success) = import_fixture(&config_path);
    assert!(success);
    assert!(stdout.contains("(0 new, 2 already stored)"));

    // Same titles under another topic are not stored again
    let root = config_path.parent().unwrap().parent().unwrap();
    let file = root.join("papers.json");
    let (stdout, _, _) = run_paperdesk(
        &config_path,
        &["import", file.to_str().unwrap(), "--topic", "vision"],
    );
    assert!(stdout.contains("(0 new, 2 already stored)"));
}

#[test]
fn test_documents_by_topic_fragment() {
    let (_tmp, config_path) = setup_test_env();
    run_paperdesk(&config_path, &["init"]);
    import_fixture(&config_path);

    let (stdout, _, success) = run_paperdesk(&config_path, &["documents", "DEEP"]);
    assert!(success);
    assert!(stdout.contains("--- deep learning (2 documents) ---"));
    assert!(stdout.contains("1. Scaling Laws for Neural Language Models"));
    assert!(stdout.contains("authors: Jared Kaplan, Sam McCandlish"));
    assert!(stdout.contains("pdf: http://arxiv.org/pdf/1512.03385v1.pdf"));
}

#[test]
fn test_documents_unknown_topic_warns() {
    let (_tmp, config_path) = setup_test_env();
    run_paperdesk(&config_path, &["init"]);

    let (stdout, _, success) = run_paperdesk(&config_path, &["documents", "quantum"]);
    assert!(success);
    assert!(stdout.contains("Warning: no documents found for topic 'quantum'"));
}

#[test]
fn test_export_roundtrip_to_file() {
    let (tmp, config_path) = setup_test_env();
    run_paperdesk(&config_path, &["init"]);
    import_fixture(&config_path);

    let out = tmp.path().join("out.json");
    let (stdout, stderr, success) = run_paperdesk(
        &config_path,
        &["export", "deep learning", out.to_str().unwrap()],
    );
    assert!(success, "export failed: {}", stderr);
    assert!(stdout.contains("Exported 2 documents"));

    let exported: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    let original: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("papers.json")).unwrap())
            .unwrap();
    assert_eq!(exported, original);
}

#[test]
fn test_export_default_path() {
    let (tmp, config_path) = setup_test_env();
    run_paperdesk(&config_path, &["init"]);
    import_fixture(&config_path);

    let (_, stderr, success) = run_paperdesk(&config_path, &["export", "Deep Learning"]);
    assert!(success, "export failed: {}", stderr);
    assert!(tmp
        .path()
        .join("data/raw/arxiv_deep_learning_documents.json")
        .exists());
}

#[test]
fn test_export_stdout() {
    let (_tmp, config_path) = setup_test_env();
    run_paperdesk(&config_path, &["init"]);
    import_fixture(&config_path);

    let (stdout, _, success) = run_paperdesk(&config_path, &["export", "deep learning", "-"]);
    assert!(success);
    let records: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["authors"], serde_json::json!(["Kaiming He"]));
}

#[test]
fn test_export_unknown_topic_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_paperdesk(&config_path, &["init"]);

    let (_, stderr, success) = run_paperdesk(&config_path, &["export", "quantum", "-"]);
    assert!(!success);
    assert!(stderr.contains("Unknown topic"));
}

#[test]
fn test_import_rejects_malformed_file() {
    let (tmp, config_path) = setup_test_env();
    run_paperdesk(&config_path, &["init"]);

    let bad = tmp.path().join("bad.json");
    fs::write(&bad, r#"{"title": "not an array"}"#).unwrap();
    let (_, stderr, success) = run_paperdesk(
        &config_path,
        &["import", bad.to_str().unwrap(), "--topic", "ai"],
    );
    assert!(!success);
    assert!(stderr.contains("Invalid interchange file"));
}

#[test]
fn test_ask_unknown_topic_warns() {
    let (_tmp, config_path) = setup_test_env();
    run_paperdesk(&config_path, &["init"]);

    let (stdout, stderr, success) =
        run_paperdesk(&config_path, &["ask", "What is attention?", "--topic", "quantum"]);
    assert!(success, "ask failed: {}", stderr);
    assert!(stdout.contains("Warning: no documents found for topic 'quantum'"));
}

#[test]
fn test_ask_errors_when_embeddings_disabled() {
    let (_tmp, config_path) = setup_test_env();
    run_paperdesk(&config_path, &["init"]);
    import_fixture(&config_path);

    let (_, stderr, success) =
        run_paperdesk(&config_path, &["ask", "What scales?", "--topic", "deep"]);
    assert!(!success);
    assert!(stderr.contains("Embedding provider is disabled"));
}

#[test]
fn test_fetch_reports_source_failure() {
    let (_tmp, config_path) = setup_test_env();
    run_paperdesk(&config_path, &["init"]);

    let (stdout, stderr, success) = run_paperdesk(&config_path, &["fetch", "ai, robotics"]);
    assert!(!success);
    assert!(stderr.contains("Error fetching 'ai'"));
    assert!(stderr.contains("Error fetching 'robotics'"));
    assert!(stderr.contains("2 of 2 topic(s) failed"));
    assert!(stdout.contains("No topics yet."));
}

#[test]
fn test_fetch_requires_topics() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_paperdesk(&config_path, &["fetch", " , "]);
    assert!(!success);
    assert!(stderr.contains("No topics given"));
}

#[test]
fn test_fetch_rejects_out_of_range_count() {
    let (_tmp, config_path) = setup_test_env();
    run_paperdesk(&config_path, &["init"]);

    for count in ["0", "201", "10000000000000"] {
        let (_, stderr, success) =
            run_paperdesk(&config_path, &["fetch", "ai", "--count", count]);
        assert!(!success, "count {} accepted", count);
        assert!(stderr.contains("between 1 and 200"), "stderr: {}", stderr);
        assert!(!stderr.contains("Error fetching"));
    }
}

#[test]
fn test_missing_config_file() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");
    let (_, stderr, success) = run_in(tmp.path(), &missing, &["topics"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_invalid_provider_rejected() {
    let (_tmp, config_path) = setup_test_env();
    let mut content = fs::read_to_string(&config_path).unwrap();
    content.push_str("\n[generation]\nprovider = \"t5\"\n");
    fs::write(&config_path, content).unwrap();

    let (_, stderr, success) = run_paperdesk(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("Unknown generation provider"));
}
