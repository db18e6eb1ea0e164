use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const CREDENTIAL_VARS: [&str; 14] = [
    "ANTHROPIC_API_KEY",
    "ANTHROPIC_BASE_URL",
    "AZURE_OPENAI_ENDPOINT",
    "AZURE_OPENAI_API_KEY",
    "AZURE_OPENAI_KEY",
    "AZURE_OPENAI_DEPLOYMENT",
    "AZURE_OPENAI_CHAT_DEPLOYMENT",
    "AZURE_SEARCH_ENDPOINT",
    "AZURE_SEARCH_ADMIN_KEY",
    "AZURE_SEARCH_KEY",
    "AZURE_SEARCH_INDEX_NAME",
    "AZURE_SEARCH_INDEX",
    "AZURE_STORAGE_ACCOUNT",
    "AZURE_STORAGE_KEY",
];

fn vault_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("vault");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::write(
        root.join("docs/overview.md"),
        "# Overview\n\nGateway architecture notes.\n",
    )
    .unwrap();
    fs::write(root.join("notes.txt"), "loose notes\n").unwrap();
    fs::create_dir_all(root.join("chapters/04_requirements/requirements")).unwrap();
    fs::write(
        root.join("chapters/04_requirements/chapter_state.yaml"),
        "title: Requirements\nstatus: in_progress\nprogress_pct: 40\n",
    )
    .unwrap();
    fs::write(
        root.join("chapters/04_requirements/requirements/REQ-001.yaml"),
        "id: REQ-001\ntitle: Input validation\n",
    )
    .unwrap();

    let config_path = root.join("config/vault.toml");
    fs::write(
        &config_path,
        format!(
            "[workspace]\nroot = \"{}\"\n\n[summarizer]\nmax_bullets = 5\n",
            root.display()
        ),
    )
    .unwrap();

    (tmp, config_path)
}

fn vault_command(config_path: &Path, args: &[&str], env: &[(&str, &str)]) -> Command {
    let mut cmd = Command::new(vault_binary());
    cmd.arg("--config").arg(config_path).args(args);
    for var in CREDENTIAL_VARS {
        cmd.env_remove(var);
    }
    cmd.env_remove("RUST_LOG");
    for (k, v) in env {
        cmd.env(k, v);
    }
    cmd
}

fn run_output(mut cmd: Command) -> Output {
    cmd.output()
        .unwrap_or_else(|e| panic!("Failed to run vault binary at {:?}: {}", vault_binary(), e))
}

fn run_vault(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let mut cmd = vault_command(config_path, args, &[]);
    cmd.stdin(Stdio::null());
    let output = run_output(cmd);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn summary_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for folder in ["docs/session_summaries", "examples/session_summaries"] {
        if let Ok(entries) = fs::read_dir(root.join(folder)) {
            out.extend(entries.filter_map(|e| e.ok()).map(|e| e.path()));
        }
    }
    out
}

#[test]
fn test_save_writes_summary_index_and_resume() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_vault(
        &config_path,
        &[
            "save",
            "--no-llm",
            "--title",
            "Gate review",
            "--tags",
            "gates, review",
            "--text",
            "We decided to keep YAML for gate files.\nNext step: add the security gate.\nReviewed the architecture diagram.",
        ],
    );
    assert!(success, "save failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Summary saved:"));
    assert!(stdout.contains("Summary engine: local_rules"));
    assert!(stdout.contains("Index updated:"));
    assert!(stdout.contains("Resume updated:"));

    let files = summary_files(tmp.path());
    assert_eq!(files.len(), 1, "expected one summary, got {:?}", files);
    let name = files[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.ends_with("_gate-review.yaml"), "unexpected name {}", name);

    let yaml = fs::read_to_string(&files[0]).unwrap();
    assert!(yaml.contains("title: Gate review"));
    assert!(yaml.contains("summary_engine: local_rules"));
    assert!(yaml.contains("- gates"));

    let index = fs::read_to_string(tmp.path().join(".memory/index.json")).unwrap();
    assert!(index.contains("docs/overview.md"));
    assert!(index.contains("Gate review"));

    let resume = fs::read_to_string(tmp.path().join(".memory/resume_context.txt")).unwrap();
    assert!(resume.contains("Gate review"));
}

#[test]
fn test_save_without_input_fails() {
    let (tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_vault(&config_path, &["save", "--no-llm"]);
    assert!(!success, "save without input should fail");
    assert!(stderr.contains("No input found"), "stderr={}", stderr);
    assert!(summary_files(tmp.path()).is_empty());
}

#[test]
fn test_save_reads_piped_stdin() {
    let (tmp, config_path) = setup_test_env();

    let mut cmd = vault_command(&config_path, &["save", "--no-llm", "--topic", "evaluation"], &[]);
    cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn().unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"Benchmarked retrieval quality on the eval set.\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout={}", stdout);
    assert!(stdout.contains("Topic routing: docs/session_summaries"));

    let files = summary_files(tmp.path());
    assert_eq!(files.len(), 1);
    assert!(files[0].to_string_lossy().contains("docs/session_summaries"));
}

#[test]
fn test_index_idempotent() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_vault(&config_path, &["index"]);
    assert!(success);
    assert!(stdout.contains("Summaries:   0"));
    let first: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(tmp.path().join(".memory/index.json")).unwrap(),
    )
    .unwrap();

    let (_, _, success) = run_vault(&config_path, &["index"]);
    assert!(success);
    let second: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(tmp.path().join(".memory/index.json")).unwrap(),
    )
    .unwrap();

    assert_eq!(first["files"], second["files"]);
    let paths: Vec<&str> = second["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["path"].as_str().unwrap())
        .collect();
    assert!(!paths.iter().any(|p| p.starts_with(".memory")));
    assert!(paths.contains(&"notes.txt"));
}

#[test]
fn test_resume_prints_latest_summaries() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_vault(&config_path, &["resume"]);
    assert!(success);
    assert!(stdout.contains("- No session summaries available yet."));

    run_vault(
        &config_path,
        &["save", "--no-llm", "--title", "First pass", "--text", "Drafted the overview."],
    );
    let (stdout, _, success) = run_vault(&config_path, &["resume"]);
    assert!(success);
    assert!(stdout.contains("First pass"));
    assert!(stdout.contains("Indexed artifacts:"));
}

#[test]
fn test_search_failure_exit_code() {
    let (_tmp, config_path) = setup_test_env();

    let cmd = vault_command(
        &config_path,
        &["index", "--search"],
        &[
            ("AZURE_SEARCH_ENDPOINT", "http://127.0.0.1:1"),
            ("AZURE_SEARCH_KEY", "test-key"),
            ("AZURE_SEARCH_INDEX", "vault"),
        ],
    );
    let output = run_output(cmd);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(2), "stdout={}", stdout);
    assert!(stdout.contains("Search ERROR:"));
}

#[test]
fn test_forced_blob_without_config_exit_code() {
    let (_tmp, config_path) = setup_test_env();

    let cmd = vault_command(
        &config_path,
        &["save", "--no-llm", "--blob", "--text", "short note"],
        &[],
    );
    let output = run_output(cmd);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(3), "stdout={}", stdout);
    assert!(stdout.contains("Summary saved:"));
    assert!(stdout.contains("Blob ERROR: Blob config missing"));
}

#[test]
fn test_status_reports_chapters_and_requirements() {
    let (tmp, config_path) = setup_test_env();
    let root = tmp.path().to_str().unwrap();

    let (stdout, _, success) = run_vault(&config_path, &["status", "04", "--path", root]);
    assert!(success);
    assert!(stdout.contains("Filter: Chapter 04"));
    assert!(stdout.contains("[~] 04_requirements: Requirements (40%)"));
    assert!(stdout.contains("## Requirements: 1/1 filled"));
    assert!(stdout.contains("full context"));
}

#[test]
fn test_sources_lists_backends() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_vault(&config_path, &["sources"]);
    assert!(success);
    assert!(stdout.contains("BACKEND"));
    assert!(stdout.contains("anthropic_claude"));
    assert!(stdout.contains("NOT CONFIGURED"));
    assert!(stdout.contains("local_rules"));
}

/// Serve one canned HTTP response on a random local port and hand back the
/// raw request that was received.
fn one_shot_server(status: &'static str, body: String) -> (String, std::thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let lower = l.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap())
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).unwrap();
        String::from_utf8_lossy(&buf).to_string()
    });

    (url, handle)
}

fn one_shot_anthropic(reply_text: &'static str) -> (String, std::thread::JoinHandle<String>) {
    let body = serde_json::json!({
        "content": [{ "type": "text", "text": reply_text }]
    })
    .to_string();
    one_shot_server("200 OK", body)
}

#[test]
fn test_save_uses_model_reply_and_repairs_truncation() {
    let (tmp, config_path) = setup_test_env();
    let (url, server) = one_shot_anthropic(
        r#"{"title": "Gateway decisions", "summary_bullets": ["Chose REST over gRPC", "Drafted rate lim"#,
    );

    let cmd = vault_command(
        &config_path,
        &["save", "--text", "Long discussion about the gateway."],
        &[("ANTHROPIC_API_KEY", "test-key"), ("ANTHROPIC_BASE_URL", &url)],
    );
    let output = run_output(cmd);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Summary engine: anthropic_claude"));

    let request = server.join().unwrap();
    assert!(request.starts_with("POST /v1/messages"));
    assert!(request.to_ascii_lowercase().contains("x-api-key: test-key"));

    let files = summary_files(tmp.path());
    assert_eq!(files.len(), 1);
    let yaml = fs::read_to_string(&files[0]).unwrap();
    assert!(yaml.contains("title: Gateway decisions"));
    assert!(yaml.contains("Chose REST over gRPC"));
    assert!(yaml.contains("Drafted rate lim"));
}

#[test]
fn test_save_falls_through_to_azure_openai() {
    let (tmp, config_path) = setup_test_env();
    let (anthropic_url, anthropic) = one_shot_server(
        "500 Internal Server Error",
        r#"{"error":{"type":"api_error","message":"overloaded"}}"#.to_string(),
    );
    let reply = r#"{"title": "Schema review", "summary_bullets": ["Mapped key field"], "decisions": ["Keep id as key"], "next_steps": []}"#;
    let (azure_url, azure) = one_shot_server(
        "200 OK",
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": reply } }]
        })
        .to_string(),
    );

    let cmd = vault_command(
        &config_path,
        &["save", "--no-blob", "--text", "Reviewed the search schema."],
        &[
            ("ANTHROPIC_API_KEY", "anthropic-key"),
            ("ANTHROPIC_BASE_URL", &anthropic_url),
            ("AZURE_OPENAI_ENDPOINT", &azure_url),
            ("AZURE_OPENAI_API_KEY", "azure-key"),
            ("AZURE_OPENAI_DEPLOYMENT", "notes-gpt"),
        ],
    );
    let output = run_output(cmd);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Summary engine: azure_openai"), "stdout={}", stdout);
    assert!(stdout.contains("[anthropic_claude]"), "stdout={}", stdout);

    assert!(anthropic.join().unwrap().starts_with("POST /v1/messages"));
    let request = azure.join().unwrap();
    assert!(request.starts_with(
        "POST /openai/deployments/notes-gpt/chat/completions?api-version="
    ));
    assert!(request.to_ascii_lowercase().contains("api-key: azure-key"));
    assert!(request.contains("json_object"));

    let files = summary_files(tmp.path());
    assert_eq!(files.len(), 1);
    let yaml = fs::read_to_string(&files[0]).unwrap();
    assert!(yaml.contains("summary_engine: azure_openai"));
    assert!(yaml.contains("Keep id as key"));
}

#[test]
fn test_bad_tuning_env_does_not_block_index() {
    let (tmp, config_path) = setup_test_env();

    let cmd = vault_command(
        &config_path,
        &["index"],
        &[
            ("ANTHROPIC_TEMPERATURE", "warm"),
            ("AZURE_OPENAI_TEMPERATURE", "3"),
        ],
    );
    let output = run_output(cmd);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stderr={}", stderr);
    assert!(stderr.contains("ANTHROPIC_TEMPERATURE"));
    assert!(tmp.path().join(".memory/index.json").exists());

    let cmd = vault_command(
        &config_path,
        &["save", "--no-llm", "--text", "Quick note."],
        &[("AZURE_OPENAI_TEMPERATURE", "3")],
    );
    assert!(run_output(cmd).status.success());
}
