//! User-level diagnostics produced by verification, and their rendering.
//!
//! A diagnostic names the offending node and where it came from (module
//! file plus line). Rendering has three shapes: an ariadne report over the
//! offending line when the module carries its source text, a plain
//! two-line form when it does not, and a one-line JSON object for tools.

use std::fmt;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use serde::Serialize;
use weft_ast::{ModuleId, NodeRef, Scope, StmtId, SymbolId};
use weft_common::{LineIndex, SourceLoc};

// ── Diagnostic ─────────────────────────────────────────────────────────

/// What verification found wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// A symbol reference whose id is not in the tree at all.
    UnknownSymbol { sym: SymbolId },
    /// A symbol reference to a symbol an earlier pass removed.
    RemovedSymbol { name: String },
    /// The recorded enclosing statement differs from the one the walk found.
    EnclosingStmtMismatch {
        expected: Option<StmtId>,
        recorded: Option<StmtId>,
    },
    /// The recorded parent symbol differs from the one the walk found.
    ParentSymbolMismatch {
        expected: Option<SymbolId>,
        recorded: Option<SymbolId>,
    },
    /// A symbol's recorded declaring scope differs from where it is declared.
    ScopeMismatch {
        name: String,
        expected: Option<Scope>,
        recorded: Option<Scope>,
    },
}

impl DiagnosticKind {
    /// Stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::UnknownSymbol { .. } => "E0101",
            DiagnosticKind::RemovedSymbol { .. } => "E0102",
            DiagnosticKind::EnclosingStmtMismatch { .. } => "E0103",
            DiagnosticKind::ParentSymbolMismatch { .. } => "E0104",
            DiagnosticKind::ScopeMismatch { .. } => "E0105",
        }
    }

    /// Short label text placed under the offending line.
    fn label(&self) -> &'static str {
        match self {
            DiagnosticKind::UnknownSymbol { .. } => "unresolved reference",
            DiagnosticKind::RemovedSymbol { .. } => "symbol no longer exists",
            DiagnosticKind::EnclosingStmtMismatch { .. } => "enclosing statement out of date",
            DiagnosticKind::ParentSymbolMismatch { .. } => "parent symbol out of date",
            DiagnosticKind::ScopeMismatch { .. } => "declaring scope out of date",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::UnknownSymbol { sym } => {
                write!(f, "reference to unknown {sym}")
            }
            DiagnosticKind::RemovedSymbol { name } => {
                write!(f, "reference to removed symbol `{name}`")
            }
            DiagnosticKind::EnclosingStmtMismatch { expected, recorded } => write!(
                f,
                "enclosing statement is {}, but {} is recorded",
                describe(expected),
                describe(recorded)
            ),
            DiagnosticKind::ParentSymbolMismatch { expected, recorded } => write!(
                f,
                "parent symbol is {}, but {} is recorded",
                describe(expected),
                describe(recorded)
            ),
            DiagnosticKind::ScopeMismatch {
                name,
                expected,
                recorded,
            } => write!(
                f,
                "`{name}` is declared in {}, but {} is recorded",
                describe(expected),
                describe(recorded)
            ),
        }
    }
}

fn describe<T: fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "nothing".to_string(),
    }
}

/// A structural violation tied to a node and its source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub module: ModuleId,
    pub file: String,
    pub line: u32,
    pub node: NodeRef,
}

impl Diagnostic {
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    pub fn location(&self) -> SourceLoc {
        SourceLoc::new(self.file.clone(), self.line)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: error[{}]: {}", self.location(), self.code(), self.kind)
    }
}

// ── Rendering ──────────────────────────────────────────────────────────

/// How diagnostics are rendered.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticOptions {
    pub color: bool,
    pub json: bool,
}

impl DiagnosticOptions {
    pub fn colorless() -> Self {
        Self {
            color: false,
            json: false,
        }
    }

    pub fn colored() -> Self {
        Self {
            color: true,
            json: false,
        }
    }

    pub fn json_mode() -> Self {
        Self {
            color: false,
            json: true,
        }
    }
}

/// Render one diagnostic. `source` is the text of the module the diagnostic
/// belongs to, when available.
pub fn render_diagnostic(diag: &Diagnostic, source: Option<&str>, opts: &DiagnosticOptions) -> String {
    if opts.json {
        return render_json(diag);
    }
    let range = source.and_then(|src| LineIndex::new(src).line_range(diag.line));
    match (source, range) {
        (Some(src), Some(range)) => render_report(diag, src, range, opts),
        _ => render_plain(diag),
    }
}

fn render_json(diag: &Diagnostic) -> String {
    let value = serde_json::json!({
        "code": diag.code(),
        "severity": "error",
        "message": diag.message(),
        "file": diag.file,
        "line": diag.line,
        "node": diag.node.to_string(),
    });
    value.to_string()
}

fn render_plain(diag: &Diagnostic) -> String {
    format!(
        "error[{}]: {}\n --> {}\n",
        diag.code(),
        diag.message(),
        diag.location()
    )
}

fn render_report(
    diag: &Diagnostic,
    source: &str,
    range: std::ops::Range<usize>,
    opts: &DiagnosticOptions,
) -> String {
    let config = Config::default().with_color(opts.color);
    let source_len = source.len();
    let start = range.start.min(source_len);
    let end = range.end.min(source_len).max(start);
    // ariadne needs at least a one-character span.
    let span = if start == end {
        start..end.saturating_add(1).min(source_len)
    } else {
        start..end
    };

    let report = Report::build(ReportKind::Error, span.clone())
        .with_code(diag.code())
        .with_message(diag.message())
        .with_config(config)
        .with_label(
            Label::new(span)
                .with_message(diag.kind.label())
                .with_color(Color::Red),
        )
        .with_note(format!("at {} in {}", diag.node, diag.location()))
        .finish();

    let mut buf = Vec::new();
    if report.write(Source::from(source), &mut buf).is_err() {
        return render_plain(diag);
    }
    String::from_utf8_lossy(&buf).into_owned()
}
