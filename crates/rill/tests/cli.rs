//! End-to-end tests for the `rill` binary's `check` and `fmt` subcommands.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn rill_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_rill"))
}

fn rill(dir: &Path, args: &[&str]) -> Output {
    Command::new(rill_bin())
        .current_dir(dir)
        .args(args)
        .output()
        .expect("failed to run rill")
}

/// All JSON objects written to stderr, one per line.
fn json_lines(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .filter(|line| line.starts_with('{'))
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn check_clean_file_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("main.rill");
    std::fs::write(&file, "fn add(a, b) { a + b }\nlet total = add(1, 2);\n").unwrap();

    let output = rill(dir.path(), &["check", "--no-color", "main.rill"]);
    assert!(
        output.status.success(),
        "rill check failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn check_reports_unresolved_name_as_json() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.rill"), "let y = x + 2;\n").unwrap();

    let output = rill(dir.path(), &["check", "--json", "main.rill"]);
    assert!(!output.status.success());

    let diagnostics = json_lines(&output);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0]["code"], "unresolved-reference");
    assert_eq!(diagnostics[0]["severity"], "error");
    assert_eq!(diagnostics[0]["message"], "cannot find `x` in this scope");
    assert_eq!(diagnostics[0]["spans"][0]["start"], 8);
    assert_eq!(diagnostics[0]["spans"][0]["end"], 9);
}

#[test]
fn check_warnings_do_not_fail() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.rill"), "fn f(unused) { 1 }\nf(2);\n").unwrap();

    let output = rill(dir.path(), &["check", "--json", "main.rill"]);
    assert!(output.status.success());
    let diagnostics = json_lines(&output);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0]["severity"], "warning");
    assert_eq!(diagnostics[0]["code"], "unused-variable");
}

#[test]
fn check_renders_syntax_errors() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.rill"), "let = 1;\n").unwrap();

    let output = rill(dir.path(), &["check", "--no-color", "main.rill"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error"), "{stderr}");
}

#[test]
fn check_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = rill(dir.path(), &["check", "absent.rill"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot read absent.rill"), "{stderr}");
}

#[test]
fn invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("rill.toml"), "[analysis]\ndebounce_ms = \"soon\"\n").unwrap();
    std::fs::write(dir.path().join("main.rill"), "let a = 1;\n").unwrap();

    let output = rill(dir.path(), &["check", "main.rill"]);
    assert!(!output.status.success());
}

#[test]
fn fmt_formats_file_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("main.rill");
    std::fs::write(&file, "fn add(a,b){a+b}").unwrap();

    let output = rill(dir.path(), &["fmt", "main.rill"]);
    assert!(
        output.status.success(),
        "rill fmt failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        std::fs::read_to_string(&file).unwrap(),
        "fn add(a, b) {\n  a + b\n}\n"
    );
}

#[test]
fn fmt_check_leaves_file_alone() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("main.rill");
    std::fs::write(&file, "fn add(a,b){a+b}").unwrap();

    let output = rill(dir.path(), &["fmt", "--check", "main.rill"]);
    assert!(!output.status.success());
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "fn add(a,b){a+b}");

    std::fs::write(&file, "fn add(a, b) {\n  a + b\n}\n").unwrap();
    let output = rill(dir.path(), &["fmt", "--check", "main.rill"]);
    assert!(output.status.success());
}

#[test]
fn fmt_reads_format_table() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("rill.toml"), "[format]\nindent_size = 4\n").unwrap();
    let file = dir.path().join("main.rill");
    std::fs::write(&file, "fn add(a,b){a+b}").unwrap();

    let output = rill(dir.path(), &["fmt", "main.rill"]);
    assert!(
        output.status.success(),
        "rill fmt failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        std::fs::read_to_string(&file).unwrap(),
        "fn add(a, b) {\n    a + b\n}\n"
    );
}

#[test]
fn fmt_rejects_invalid_format_table() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("rill.toml"), "[format]\nindent_size = 0\n").unwrap();
    let file = dir.path().join("main.rill");
    std::fs::write(&file, "fn add(a,b){a+b}").unwrap();

    let output = rill(dir.path(), &["fmt", "main.rill"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("format.indent_size"), "{stderr}");
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "fn add(a,b){a+b}");
}

#[test]
fn fmt_refuses_broken_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("main.rill");
    std::fs::write(&file, "fn broken( {").unwrap();

    let output = rill(dir.path(), &["fmt", "main.rill"]);
    assert!(!output.status.success());
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "fn broken( {");
}

#[test]
fn lsp_subcommand_is_available() {
    let output = Command::new(rill_bin())
        .args(["lsp", "--help"])
        .output()
        .expect("failed to run rill lsp --help");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("language server"), "{stdout}");
}
