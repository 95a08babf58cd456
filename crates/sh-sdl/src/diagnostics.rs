use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};

/// How bad a problem is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// The load failed.
    Error,
    /// Suspicious but accepted input.
    Warning,
}

impl Severity {
    fn report_kind(self) -> ReportKind<'static> {
        match self {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        }
    }

    fn color(self) -> Color {
        match self {
            Severity::Error => Color::Red,
            Severity::Warning => Color::Yellow,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        })
    }
}

/// A problem found while loading a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Error or warning.
    pub severity: Severity,
    /// Byte range in the file being loaded. Problems inside an included
    /// file point at the `include` statement that pulled it in.
    pub span: Range<usize>,
    /// What went wrong, without location.
    pub message: String,
    /// Optional label shown under the highlighted span.
    pub label: Option<String>,
    /// Included files the problem was found through, outermost first.
    /// Empty when the problem is in the loaded file itself.
    pub include_chain: Vec<PathBuf>,
}

impl Diagnostic {
    fn new(severity: Severity, span: Range<usize>, message: impl Into<String>) -> Self {
        Self {
            severity,
            span,
            message: message.into(),
            label: None,
            include_chain: Vec::new(),
        }
    }

    /// Create an error diagnostic.
    pub fn error(span: Range<usize>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, span, message)
    }

    /// Create a warning diagnostic.
    pub fn warning(span: Range<usize>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, span, message)
    }

    /// Attach a label to the highlighted span.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Re-anchor a diagnostic reported by `file` onto the `include`
    /// statement at `span` in the including file.
    pub fn included_from(mut self, span: Range<usize>, file: impl Into<PathBuf>) -> Self {
        self.span = span;
        self.include_chain.insert(0, file.into());
        self.label = None;
        self
    }

    /// Whether this diagnostic fails the load.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// The message prefixed with the include chain, e.g.
    /// `in parts/arm.scene: unknown property "colour"`.
    pub fn located_message(&self) -> String {
        let mut text = String::new();
        for file in &self.include_chain {
            text.push_str(&format!("in {}: ", file.display()));
        }
        text.push_str(&self.message);
        text
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.located_message())
    }
}

/// Error and warning counts of one load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    /// Diagnostics that failed the load.
    pub errors: usize,
    /// Diagnostics that did not.
    pub warnings: usize,
}

impl Tally {
    /// Count `diagnostics` by severity.
    pub fn of(diagnostics: &[Diagnostic]) -> Self {
        let errors = diagnostics.iter().filter(|d| d.is_error()).count();
        Self {
            errors,
            warnings: diagnostics.len() - errors,
        }
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let warnings = count(self.warnings, "warning");
        if self.errors == 0 {
            f.write_str(&warnings)
        } else {
            write!(f, "{}, {warnings}", count(self.errors, "error"))
        }
    }
}

fn count(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

/// Render diagnostics for a terminal, in source order with errors first on
/// the same line. `color` is off for logs and pipes.
pub fn render_diagnostics(
    source: &str,
    filename: &str,
    diagnostics: &[Diagnostic],
    color: bool,
) -> String {
    let mut ordered: Vec<&Diagnostic> = diagnostics.iter().collect();
    ordered.sort_by_key(|d| (d.span.start, d.severity));

    let mut output = Vec::new();
    for diag in ordered {
        // Spans from a stale or included source may run past the end.
        let end = diag.span.end.min(source.len());
        let span = diag.span.start.min(end)..end;

        let label = match (&diag.label, diag.include_chain.is_empty()) {
            (Some(label), _) => label.clone(),
            (None, true) => diag.message.clone(),
            (None, false) => "problem inside this include".to_string(),
        };

        let mut report = Report::build(diag.severity.report_kind(), (filename, span.clone()))
            .with_config(Config::default().with_color(color))
            .with_message(&diag.message)
            .with_label(
                Label::new((filename, span))
                    .with_message(label)
                    .with_color(diag.severity.color()),
            );
        if !diag.include_chain.is_empty() {
            let chain: Vec<String> = diag
                .include_chain
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            report = report.with_note(format!("found in {}", chain.join(" -> ")));
        }

        // Writing into a Vec cannot fail.
        report
            .finish()
            .write((filename, Source::from(source)), &mut output)
            .ok();
    }

    String::from_utf8(output).unwrap_or_default()
}
