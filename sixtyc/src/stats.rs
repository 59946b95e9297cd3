//! Compilation statistics, `spec.md` section 6.

/// `{codeBytes, dataBytes, functionCount, globalCount, totalBytes,
/// lineCount, optimizationPasses, optimizationChanged}`, `spec.md`
/// section 6 ("Compilation statistics").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompilationStats {
    /// Bytes contributed by instructions.
    pub code_bytes: u32,
    /// Bytes contributed by data directives (globals, string literals).
    pub data_bytes: u32,
    /// Number of function labels emitted.
    pub function_count: u32,
    /// Number of global labels emitted.
    pub global_count: u32,
    /// `code_bytes + data_bytes`.
    pub total_bytes: u32,
    /// Number of lines in the emitted assembly text.
    pub line_count: u32,
    /// Number of optimization passes run (`spec.md`'s `optimize` flag is
    /// a pass-through shell: this is `1` when requested, `0` otherwise --
    /// see [`crate::CompilerOptions::optimize`]).
    pub optimization_passes: u32,
    /// Whether any optimization pass actually changed the program.
    /// Always `false`: no transformation runs on top of the dataflow
    /// analyses' own annotations (`spec.md`'s non-goal, "no general
    /// optimization").
    pub optimization_changed: bool,
}
