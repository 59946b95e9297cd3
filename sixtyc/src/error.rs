//! Internal (compiler-bug) errors, `spec.md` section 7's "Internal"
//! error kind, kept as a `thiserror`-derived enum distinct from
//! [`sixtyc_diagnostics::Diagnostic`] -- the same split the teacher's
//! `cranelift-codegen::CodegenError` draws between "the input program has
//! a user-facing problem" (a diagnostic) and "the compiler's own
//! invariants were violated" (a Rust error a caller can `?`-propagate and
//! that indicates a bug in this crate, not the user's program).
//!
//! [`Pipeline::compile`](crate::Pipeline::compile) never returns this
//! directly: every [`InternalError`] it could encounter is instead folded
//! into the returned [`sixtyc_diagnostics::DiagnosticBag`] with an
//! `INTERNAL-` code prefix, per `spec.md` section 7 ("Internal errors
//! surface as errors with code prefix `INTERNAL-`... should include
//! enough context... to reproduce"). The enum stays public so that
//! library consumers embedding individual phases directly (skipping
//! [`crate::Pipeline`]) can match on it themselves.

use sixtyc_diagnostics::{codes, Diagnostic, Span};

/// A condition that can only arise from a bug in this compiler, not from
/// anything the user's source program did.
#[derive(Debug, thiserror::Error)]
pub enum InternalError {
    /// SSA construction's verification phase (`spec.md` section 4.4 phase
    /// 6) found a violated invariant: a use not dominated by its
    /// definition, or a phi with the wrong operand arity.
    #[error("SSA verification failed in function `{function}`: {detail}")]
    SsaVerification {
        /// The function SSA construction was run on.
        function: String,
        /// What the verifier found.
        detail: String,
    },
    /// Code generation's per-opcode lowering table has no entry for an
    /// opcode it was handed -- `spec.md` section 4.7: "Unsupported
    /// opcodes emit a `STUB` comment plus a `NOP`, and a warning" covers
    /// *target-level* gaps (an opcode with no 6502 encoding); this is the
    /// stricter case of an opcode the lowering table's match was never
    /// written to accept at all (e.g. a bare `Phi` surviving into
    /// lowering because SSA construction ran when it shouldn't have).
    #[error("unhandled opcode in function `{function}`, instruction {instruction}: {detail}")]
    UnhandledOpcode {
        /// The function being lowered.
        function: String,
        /// The instruction id that triggered this.
        instruction: String,
        /// What went wrong.
        detail: String,
    },
    /// The module graph or call graph handed to a later phase referenced
    /// a module or function name no earlier phase ever declared.
    #[error("internal consistency error: {0}")]
    Inconsistent(String),
}

impl InternalError {
    /// Convert to an `INTERNAL-`-prefixed error [`Diagnostic`] at the
    /// pipeline boundary, per `spec.md` section 7.
    pub fn into_diagnostic(self, span: Span) -> Diagnostic {
        let code = match &self {
            InternalError::SsaVerification { .. } => codes::INTERNAL_SSA_VERIFY,
            InternalError::UnhandledOpcode { .. } => codes::INTERNAL_UNHANDLED_OPCODE,
            InternalError::Inconsistent(_) => "INTERNAL-CONSISTENCY",
        };
        Diagnostic::internal(code, self.to_string(), span)
    }
}
