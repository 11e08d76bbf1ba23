//! The Rill command line tool.
//!
//! Provides the `rill` command with the following subcommands:
//!
//! - `rill lsp` - Start the language server (communicates via stdin/stdout)
//! - `rill check <file>` - Report syntax and name resolution problems
//! - `rill fmt <file>` - Format a file in place
//!
//! Options:
//! - `--log` - Tracing filter for stderr logging (default from `RILL_LOG`)
//! - `check --json` - Output diagnostics as JSON (one object per line)
//! - `check --tree` - Print the concrete syntax tree first
//! - `check --no-color` - Disable colorized output
//! - `fmt --check` - Only report whether the file is formatted
//!
//! Both `[analysis]` and `[format]` are read from `rill.toml` in the
//! current directory.

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use rill_analysis::{AnalysisConfig, AnalysisSession, Diagnostic, SemanticDiagnosticKind, Severity};
use rill_parser::TextRange;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "rill", version, about = "The Rill language tool")]
struct Cli {
    /// Tracing filter for logs written to stderr (e.g. `rill_analysis=debug`)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the language server (communicates via stdin/stdout)
    Lsp,
    /// Report syntax errors and name resolution problems in a file
    Check {
        /// Path to a `.rill` file
        file: PathBuf,

        /// Print the concrete syntax tree before the diagnostics
        #[arg(long)]
        tree: bool,

        /// Output diagnostics as JSON (one object per line) instead of human-readable format
        #[arg(long)]
        json: bool,

        /// Disable colorized output
        #[arg(long = "no-color")]
        no_color: bool,
    },
    /// Format a file in place
    Fmt {
        /// Path to a `.rill` file
        file: PathBuf,

        /// Exit with an error instead of writing if the file is not formatted
        #[arg(long)]
        check: bool,
    },
}

struct CheckOptions {
    tree: bool,
    json: bool,
    color: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref());

    match run(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr: stdout carries the LSP transport.
fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => EnvFilter::try_new(directives).ok(),
        None => EnvFilter::try_from_env("RILL_LOG").ok(),
    }
    .unwrap_or_else(|| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

/// Execute a subcommand. `Ok(false)` means it ran but found problems.
fn run(command: Commands) -> anyhow::Result<bool> {
    let cwd = std::env::current_dir().context("cannot determine the current directory")?;
    let config = AnalysisConfig::load(&cwd)?;

    match command {
        Commands::Lsp => {
            let rt = tokio::runtime::Runtime::new().context("failed to create tokio runtime")?;
            rt.block_on(rill_lsp::run_server(config));
            Ok(true)
        }
        Commands::Check {
            file,
            tree,
            json,
            no_color,
        } => {
            let options = CheckOptions {
                tree,
                json,
                color: !no_color && !json,
            };
            check(&file, &options, config)
        }
        Commands::Fmt { file, check } => {
            let format = rill_fmt::FormatConfig::load(&cwd)?.unwrap_or_default();
            fmt(&file, check, &format)
        }
    }
}

/// Analyze one file through an [`AnalysisSession`] and report what it finds.
/// Returns false if there are any errors.
fn check(path: &Path, options: &CheckOptions, config: AnalysisConfig) -> anyhow::Result<bool> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;

    if options.tree {
        let tree = rill_parser::parse(&source);
        print!("{}", rill_parser::debug_tree(&tree.syntax()));
    }

    let absolute = fs::canonicalize(path)
        .with_context(|| format!("cannot resolve {}", path.display()))?;
    let uri = Url::from_file_path(&absolute)
        .map_err(|()| anyhow!("cannot turn {} into a file URI", absolute.display()))?;

    let session = AnalysisSession::new(config);
    session.did_open(&uri, source.as_str(), 0)?;
    session.drain_tasks();
    let snapshot = session
        .snapshot(&uri)
        .ok_or_else(|| anyhow!("{} was not analyzed", path.display()))?;

    let mut diagnostics: Vec<Diagnostic> = snapshot
        .syntax_diagnostics
        .iter()
        .cloned()
        .map(Diagnostic::Syntax)
        .chain(
            snapshot
                .semantic_diagnostics()
                .iter()
                .cloned()
                .map(Diagnostic::Semantic),
        )
        .collect();
    diagnostics.sort_by_key(|d| d.range().start());

    let file_name = path.display().to_string();
    for diagnostic in &diagnostics {
        if options.json {
            eprintln!("{}", json_diagnostic(diagnostic, &file_name));
        } else {
            render_diagnostic(diagnostic, &source, options.color)?;
        }
    }

    let errors = diagnostics
        .iter()
        .filter(|d| d.severity() == Severity::Error)
        .count();
    tracing::debug!(file = %file_name, errors, total = diagnostics.len(), "checked");
    Ok(errors == 0)
}

/// Byte range for ariadne; empty ranges are widened to one byte so the
/// label has something to point at.
fn span(range: TextRange) -> Range<usize> {
    let start = usize::from(range.start());
    let end = usize::from(range.end()).max(start + 1);
    start..end
}

fn json_diagnostic(diagnostic: &Diagnostic, file_name: &str) -> serde_json::Value {
    let (code, severity) = match diagnostic {
        Diagnostic::Syntax(_) => ("syntax-error", "error"),
        Diagnostic::Semantic(d) => (
            d.code(),
            match d.severity() {
                Severity::Error => "error",
                Severity::Warning => "warning",
            },
        ),
    };
    let range = diagnostic.range();
    serde_json::json!({
        "code": code,
        "severity": severity,
        "message": diagnostic.message(),
        "file": file_name,
        "spans": [{
            "start": u32::from(range.start()),
            "end": u32::from(range.end()),
        }],
    })
}

fn render_diagnostic(diagnostic: &Diagnostic, source: &str, color: bool) -> anyhow::Result<()> {
    use ariadne::{Config, IndexType, Label, Report, ReportKind, Source};

    let config = Config::default()
        .with_color(color)
        .with_index_type(IndexType::Byte);
    let kind = match diagnostic.severity() {
        Severity::Error => ReportKind::Error,
        Severity::Warning => ReportKind::Warning,
    };
    let primary = span(diagnostic.range());
    let mut report = Report::<Range<usize>>::build(kind, primary.clone())
        .with_message(diagnostic.message())
        .with_config(config)
        .with_label(Label::new(primary).with_message(diagnostic.message()));

    match diagnostic {
        Diagnostic::Syntax(d) => {
            if let Some((message, related)) = &d.related {
                report = report.with_label(Label::new(span(*related)).with_message(message));
            }
        }
        Diagnostic::Semantic(d) => {
            if let SemanticDiagnosticKind::DuplicateDefinition { first, .. } = &d.kind {
                report =
                    report.with_label(Label::new(span(*first)).with_message("first defined here"));
            }
            report = report.with_note(format!("code: {}", d.code()));
        }
    }

    report
        .finish()
        .eprint(Source::from(source))
        .context("cannot write diagnostics")
}

/// Format `path` in place, or with `check` only report whether it is
/// formatted. Returns false if a check found an unformatted file.
fn fmt(path: &Path, check: bool, config: &rill_fmt::FormatConfig) -> anyhow::Result<bool> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let Some(formatted) = rill_fmt::try_format(&source, config) else {
        bail!(
            "{} has syntax errors; run `rill check` to see them",
            path.display()
        );
    };

    if formatted == source {
        return Ok(true);
    }
    if check {
        eprintln!("would reformat {}", path.display());
        return Ok(false);
    }
    fs::write(path, formatted).with_context(|| format!("cannot write {}", path.display()))?;
    Ok(true)
}
