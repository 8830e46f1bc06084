use std::net::TcpListener;
use std::thread;

use assert_cmd::Command;
use once_cell::sync::Lazy;
use predicates::prelude::*;

static RESPONSE: Lazy<String> = Lazy::new(|| {
    serde_json::json!({
        "slither_report": "INFO:Detectors:\nReentrancy in Bank.withdraw() WARNING\nERROR: integer overflow",
        "llm_summary": "Simulated audit summary."
    })
    .to_string()
});

/// Serve a single canned HTTP response on an ephemeral loopback port.
fn serve_once(status_line: &'static str, body: String) -> String {
    use std::io::{Read, Write};

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 8192];
            let _ = stream.read(&mut buf);
            let response = format!(
                "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    format!("http://{addr}/analyze")
}

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("audit-lens-cli").unwrap();
    cmd.env_remove("AUDIT_LENS_ENDPOINT")
        .env_remove("AUDIT_LENS_MAX_RETRIES")
        .env("AUDIT_LENS_TIMEOUT", "5s");
    cmd
}

#[test]
#[ignore = "requires loopback networking"]
fn analyze_prints_scored_report_and_exports_pdf() {
    let endpoint = serve_once("HTTP/1.1 200 OK", RESPONSE.clone());
    let dir = tempfile::tempdir().unwrap();
    let export = dir.path().join("audit_report.pdf");

    cli()
        .args([
            "--endpoint",
            &endpoint,
            "analyze",
            "--no-color",
            "--export",
            export.to_str().unwrap(),
        ])
        .write_stdin("contract Bank {}")
        .assert()
        .success()
        .stdout(predicate::str::contains("Risk Score: 83/100 (Low)"))
        .stdout(predicate::str::contains("Simulated audit summary."))
        .stdout(predicate::str::contains("Suggestion: Use a reentrancy guard"))
        .stdout(predicate::str::contains("Suggestion: Use SafeMath"));

    let bytes = std::fs::read(&export).unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
}

#[test]
#[ignore = "requires loopback networking"]
fn analyze_raw_prints_body_verbatim() {
    let endpoint = serve_once("HTTP/1.1 200 OK", "raw <b>report</b>".to_string());

    cli()
        .args(["--endpoint", &endpoint, "analyze", "--raw"])
        .write_stdin("contract A {}")
        .assert()
        .success()
        .stdout(predicate::str::contains("raw <b>report</b>"))
        .stdout(predicate::str::contains("Risk Score").not());
}

#[test]
#[ignore = "requires loopback networking"]
fn analyze_server_error_is_coarse() {
    let endpoint = serve_once("HTTP/1.1 500 Internal Server Error", "{}".to_string());

    cli()
        .args(["--endpoint", &endpoint, "analyze"])
        .write_stdin("contract A {}")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error analyzing contract."));
}

#[test]
#[ignore = "requires loopback networking"]
fn export_write_failure_is_coarse() {
    let endpoint = serve_once("HTTP/1.1 200 OK", RESPONSE.clone());
    let dir = tempfile::tempdir().unwrap();
    let export = dir.path().join("missing").join("audit_report.txt");

    cli()
        .args([
            "--endpoint",
            &endpoint,
            "analyze",
            "--no-color",
            "--export",
            export.to_str().unwrap(),
        ])
        .write_stdin("contract Bank {}")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error analyzing contract."));
    assert!(!export.exists());
}
