//! Located diagnostics and the `Expected` result alias.
//!
//! Build-time failures (parse errors, verifier errors, capacity exhaustion)
//! travel as `Diag` values carrying a severity, message, and source location.
//! Fallible API surfaces return `Expected<T>` so callers propagate with `?`.

use crate::source_loc::SourceLoc;
use crate::source_manager::SourceManager;
use std::fmt;

/// Diagnostic severity levels, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single located diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct Diag {
    pub severity: Severity,
    pub message: String,
    pub loc: SourceLoc,
}

impl Diag {
    pub fn error(message: impl Into<String>, loc: SourceLoc) -> Self {
        Diag {
            severity: Severity::Error,
            message: message.into(),
            loc,
        }
    }

    pub fn warning(message: impl Into<String>, loc: SourceLoc) -> Self {
        Diag {
            severity: Severity::Warning,
            message: message.into(),
            loc,
        }
    }

    pub fn note(message: impl Into<String>, loc: SourceLoc) -> Self {
        Diag {
            severity: Severity::Note,
            message: message.into(),
            loc,
        }
    }

    /// Format as `path:line:col: severity: message`, resolving the file id
    /// through `sm` and eliding coordinates that are unknown.
    pub fn render(&self, sm: Option<&SourceManager>) -> String {
        let mut out = String::new();
        let path = sm.and_then(|sm| sm.path(self.loc.file_id));
        if let Some(path) = path {
            out.push_str(path);
            if self.loc.line != 0 {
                out.push_str(&format!(":{}", self.loc.line));
                if self.loc.column != 0 {
                    out.push_str(&format!(":{}", self.loc.column));
                }
            }
            out.push_str(": ");
        } else if self.loc.line != 0 {
            out.push_str(&format!("{}: ", self.loc));
        }
        out.push_str(&format!("{}: {}", self.severity, self.message));
        out
    }
}

impl fmt::Display for Diag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(None))
    }
}

impl std::error::Error for Diag {}

/// Success-or-diagnostic sum used across fallible API surfaces.
pub type Expected<T> = Result<T, Diag>;

/// Collects diagnostics and tracks severity counts for driver exit decisions.
#[derive(Debug, Default)]
pub struct DiagnosticEngine {
    diags: Vec<Diag>,
    errors: usize,
    warnings: usize,
}

impl DiagnosticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diag: Diag) {
        match diag.severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Note => {}
        }
        self.diags.push(diag);
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    pub fn diagnostics(&self) -> &[Diag] {
        &self.diags
    }

    /// Print every collected diagnostic, one per line, to `out`.
    pub fn print_all(&self, out: &mut impl std::io::Write, sm: Option<&SourceManager>) {
        for d in &self.diags {
            let _ = writeln!(out, "{}", d.render(sm));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_source_manager() {
        let mut sm = SourceManager::new();
        let id = sm.add_file("main.bas");
        let d = Diag::error("unknown temp '%x'", SourceLoc::new(id, 3, 9));
        assert_eq!(d.render(Some(&sm)), "main.bas:3:9: error: unknown temp '%x'");
    }

    #[test]
    fn test_render_elides_missing_coordinates() {
        let mut sm = SourceManager::new();
        let id = sm.add_file("main.bas");
        let d = Diag::warning("shadowed label", SourceLoc::new(id, 3, 0));
        assert_eq!(d.render(Some(&sm)), "main.bas:3: warning: shadowed label");
        let d = Diag::note("see declaration", SourceLoc::UNKNOWN);
        assert_eq!(d.render(Some(&sm)), "note: see declaration");
    }

    #[test]
    fn test_engine_counts() {
        let mut engine = DiagnosticEngine::new();
        engine.report(Diag::error("e", SourceLoc::UNKNOWN));
        engine.report(Diag::warning("w", SourceLoc::UNKNOWN));
        engine.report(Diag::note("n", SourceLoc::UNKNOWN));
        assert_eq!(engine.error_count(), 1);
        assert_eq!(engine.warning_count(), 1);
        assert_eq!(engine.diagnostics().len(), 3);
    }
}
