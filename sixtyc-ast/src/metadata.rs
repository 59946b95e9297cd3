//! Per-node analysis metadata.
//!
//! The source language this compiler grew out of kept a single mutable
//! map on every AST node, keyed by an enum with heterogeneous value types
//! (`ConstantValue`, `DeadCodeUnreachable`, ...). That pattern doesn't
//! translate: Rust has no ergonomic heterogeneous map without `Any` and
//! downcasting, which throws away the static typing this rewrite is
//! for. Instead every node embeds one `NodeMetadata`, a plain
//! struct-of-optionals -- one field per analysis -- written by exactly the
//! analyses enumerated in `spec.md` section 4.5 and read by every later
//! stage. This is the first alternative offered in `spec.md`'s "Design
//! notes" redesign flags.

use std::fmt;

/// Constant-propagation lattice value, `spec.md` section 4.5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstLattice {
    /// Not yet analyzed / no information.
    Top,
    /// Exactly this compile-time-known value.
    Constant(i64),
    /// Provably not a single constant (conflicting definitions, or a
    /// non-constant operand).
    Bottom,
}

impl ConstLattice {
    /// The meet (⊓) operation of the lattice.
    pub fn meet(&self, other: &ConstLattice) -> ConstLattice {
        match (self, other) {
            (ConstLattice::Top, x) | (x, ConstLattice::Top) => x.clone(),
            (ConstLattice::Bottom, _) | (_, ConstLattice::Bottom) => ConstLattice::Bottom,
            (ConstLattice::Constant(a), ConstLattice::Constant(b)) => {
                if a == b {
                    ConstLattice::Constant(*a)
                } else {
                    ConstLattice::Bottom
                }
            }
        }
    }

    /// Is this a known constant?
    pub fn as_constant(&self) -> Option<i64> {
        match self {
            ConstLattice::Constant(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ConstLattice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConstLattice::Top => write!(f, "⊤"),
            ConstLattice::Bottom => write!(f, "⊥"),
            ConstLattice::Constant(v) => write!(f, "{v}"),
        }
    }
}

/// Why a dead node is dead, `spec.md` section 4.5 ("Dead-code detection").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadCodeReason {
    /// Follows a `return`/`break`/`continue` in the same block.
    UnreachableAfterTerminator,
    /// Not reachable from the entry block of the enclosing function at all.
    UnreachableFromEntry,
    /// The `then` (or `else`) branch of an `if` whose condition is a
    /// literal constant that selects the other branch.
    DeadBranch,
}

/// Why a variable escapes, `spec.md` section 4.5 ("Escape analysis").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeReason {
    /// Passed as an argument to a function call.
    PassedToFunction,
    /// Returned from its enclosing function.
    ReturnedFromFunction,
    /// Assigned into a global variable.
    StoredGlobally,
    /// Had its address taken.
    AddressTaken,
}

/// Per-node analysis results. Every field starts `None`/absent and is
/// populated by exactly one analysis, in the fixed order `spec.md` section
/// 3 describes ("the metadata map is mutated by analyses in a fixed
/// order"). Never read before that analysis has run for the enclosing
/// function.
#[derive(Debug, Clone, Default)]
pub struct NodeMetadata {
    /// Constant-propagation lattice value for an expression, or the
    /// inferred value of a declared variable.
    pub constant_value: Option<ConstLattice>,
    /// Set on an expression node once constant propagation has folded it;
    /// carries the folded result.
    pub constant_foldable: Option<i64>,
    /// Set on a dead statement/branch by dead-code detection.
    pub dead_code: Option<DeadCodeReason>,
    /// Escape-analysis result for a local variable declaration.
    pub escapes: Option<EscapeReason>,
    /// Stack-depth contribution, set on function declarations by escape
    /// analysis's stack-depth pass.
    pub stack_depth: Option<u32>,
    /// Set on a loop header by loop analysis: true if this loop's bound
    /// expression was proven loop-invariant.
    pub loop_invariant: bool,
}

impl NodeMetadata {
    /// A node with no metadata recorded yet.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Does constant propagation consider this node's value exactly one
    /// known constant?
    pub fn is_constant(&self) -> bool {
        matches!(self.constant_value, Some(ConstLattice::Constant(_)))
    }

    /// Is this node marked dead by dead-code detection?
    pub fn is_dead(&self) -> bool {
        self.dead_code.is_some()
    }
}
