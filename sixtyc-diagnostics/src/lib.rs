//! Source spans and the diagnostic taxonomy shared by every compilation
//! phase. No phase raises a Rust panic for a user-facing problem; it pushes
//! a [`Diagnostic`] onto a [`DiagnosticBag`] and keeps going as far as it
//! usefully can, per `spec.md` section 7's propagation policy.

#![deny(missing_docs)]

use std::fmt;

/// A single point in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub col: u32,
    /// 0-based byte offset into the source file.
    pub offset: u32,
}

impl Position {
    /// Construct a new position.
    pub const fn new(line: u32, col: u32, offset: u32) -> Self {
        Self { line, col, offset }
    }
}

/// A half-open range of source text, plus the file it came from. Attached
/// to every AST node, IL instruction, and AsmIL item for diagnostics and
/// source maps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// Start of the span, inclusive.
    pub start: Position,
    /// End of the span, exclusive.
    pub end: Position,
    /// Source file this span is within.
    pub file: String,
}

impl Span {
    /// Construct a new span.
    pub fn new(start: Position, end: Position, file: impl Into<String>) -> Self {
        Self {
            start,
            end,
            file: file.into(),
        }
    }

    /// A span with no useful source location, used for synthesized nodes
    /// (e.g. IL inserted by SSA construction) that have no single origin.
    pub fn synthetic() -> Self {
        Self::default()
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.file, self.start.line, self.start.col
        )
    }
}

/// Diagnostic severity. Only `Error` causes a non-zero exit (`spec.md`
/// section 7, "User-visible failure behavior").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    /// Informational; never affects exit status.
    Info,
    /// A problem the compiler worked around; never affects exit status.
    Warning,
    /// A problem that invalidates the result; causes a non-zero exit.
    Error,
}

/// A single diagnostic: a severity, a machine-parseable upper-case code
/// prefix (see the `codes` module), an English message, and the span it's
/// about.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostic {
    /// Error, Warning, or Info.
    pub severity: Severity,
    /// Machine-parseable code, e.g. `"MODULE-CYCLE"`, `"INTERNAL-SSA-VERIFY"`.
    pub code: &'static str,
    /// Human-readable English message.
    pub message: String,
    /// Where in the source this diagnostic applies.
    pub span: Span,
}

impl Diagnostic {
    /// Build an error-severity diagnostic.
    pub fn error(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            span,
        }
    }

    /// Build a warning-severity diagnostic.
    pub fn warning(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            span,
        }
    }

    /// Build an info-severity diagnostic.
    pub fn info(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Info,
            code,
            message: message.into(),
            span,
        }
    }

    /// Build an `INTERNAL-`-prefixed error diagnostic for a compiler-bug
    /// condition, per `spec.md` section 7 ("Internal errors surface as
    /// errors with code prefix `INTERNAL-`").
    pub fn internal(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        debug_assert!(code.starts_with("INTERNAL-"));
        Self::error(code, message, span)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let sev = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        write!(f, "{sev}[{}]: {} ({})", self.code, self.message, self.span)
    }
}

/// An append-only collection of diagnostics accumulated over the course of
/// a pipeline phase. Per `spec.md` section 5 ("Shared-resource policy"),
/// this is the one place in the pipeline that's mutated after its owning
/// phase nominally finishes -- callers merge a phase's bag into the
/// pipeline-wide bag once the phase returns.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Append another bag's diagnostics onto this one, in order.
    pub fn extend(&mut self, other: DiagnosticBag) {
        self.diagnostics.extend(other.diagnostics);
    }

    /// True if any diagnostic has `Severity::Error`.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// All diagnostics, in the order they were pushed.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Number of diagnostics accumulated so far.
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Is the bag empty?
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Machine-parseable diagnostic code constants, grouped by the taxonomy in
/// `spec.md` section 7.
pub mod codes {
    /// Module: missing module.
    pub const MODULE_NOT_FOUND: &str = "MODULE-NOT-FOUND";
    /// Module: duplicate module declaration.
    pub const MODULE_DUPLICATE: &str = "MODULE-DUPLICATE";
    /// Module: circular dependency.
    pub const MODULE_CYCLE: &str = "MODULE-CYCLE";
    /// Module: imported symbol not found.
    pub const MODULE_SYMBOL_NOT_FOUND: &str = "MODULE-SYMBOL-NOT-FOUND";
    /// Module: imported symbol not exported.
    pub const MODULE_SYMBOL_NOT_EXPORTED: &str = "MODULE-SYMBOL-NOT-EXPORTED";

    /// Semantic: undefined variable.
    pub const SEMA_UNDEFINED_VARIABLE: &str = "SEMA-UNDEFINED-VARIABLE";
    /// Semantic: type mismatch.
    pub const SEMA_TYPE_MISMATCH: &str = "SEMA-TYPE-MISMATCH";
    /// Semantic: non-void function returning void, or vice versa.
    pub const SEMA_RETURN_TYPE_MISMATCH: &str = "SEMA-RETURN-TYPE-MISMATCH";
    /// Semantic: `break`/`continue` outside a loop.
    pub const SEMA_LOOP_CONTROL_OUTSIDE_LOOP: &str = "SEMA-LOOP-CONTROL-OUTSIDE-LOOP";
    /// Semantic: `return` outside a function.
    pub const SEMA_RETURN_OUTSIDE_FUNCTION: &str = "SEMA-RETURN-OUTSIDE-FUNCTION";
    /// Semantic: multiple `default` cases in a `switch`.
    pub const SEMA_MULTIPLE_DEFAULT: &str = "SEMA-MULTIPLE-DEFAULT";

    /// Analytical: direct or indirect recursion detected.
    pub const RECURSION_DETECTED: &str = "RECURSION-DETECTED";

    /// Resource: stack depth exceeds the 256-byte hardware stack.
    pub const STACK_OVERFLOW_RISK: &str = "STACK-OVERFLOW-RISK";
    /// Resource: stack depth above the configurable warning threshold.
    pub const STACK_DEPTH_WARNING: &str = "STACK-DEPTH-WARNING";

    /// Dead code: unreachable statement.
    pub const DEAD_CODE_UNREACHABLE: &str = "DEAD-CODE-UNREACHABLE";
    /// Dead code: statically-dead branch of an `if`.
    pub const DEAD_CODE_BRANCH: &str = "DEAD-CODE-BRANCH";

    /// Internal: SSA verification failure.
    pub const INTERNAL_SSA_VERIFY: &str = "INTERNAL-SSA-VERIFY";
    /// Internal: unhandled opcode during code generation.
    pub const INTERNAL_UNHANDLED_OPCODE: &str = "INTERNAL-UNHANDLED-OPCODE";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bag_reports_errors() {
        let mut bag = DiagnosticBag::new();
        assert!(!bag.has_errors());
        bag.push(Diagnostic::warning("W", "careful", Span::synthetic()));
        assert!(!bag.has_errors());
        bag.push(Diagnostic::error(
            codes::RECURSION_DETECTED,
            "recursion in foo",
            Span::synthetic(),
        ));
        assert!(bag.has_errors());
        assert_eq!(bag.len(), 2);
    }

    #[test]
    fn extend_preserves_order() {
        let mut a = DiagnosticBag::new();
        a.push(Diagnostic::info("A", "first", Span::synthetic()));
        let mut b = DiagnosticBag::new();
        b.push(Diagnostic::info("B", "second", Span::synthetic()));
        a.extend(b);
        let codes: Vec<_> = a.iter().map(|d| d.code).collect();
        assert_eq!(codes, vec!["A", "B"]);
    }
}
