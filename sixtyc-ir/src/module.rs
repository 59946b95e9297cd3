//! The IL module, `spec.md` section 3: owns every function it declares.

use crate::function::Function;
use rustc_hash::FxHashMap;
use sixtyc_ast::Type;

/// A module-level global variable.
#[derive(Debug, Clone)]
pub struct Global {
    /// Global's name.
    pub name: String,
    /// Global's type.
    pub ty: Type,
    /// Whether an initial value was given (storage is always
    /// statically allocated either way; see the frame allocator,
    /// `spec.md` section 4.11, for globals vs. per-function locals).
    pub has_initializer: bool,
    /// Visible to other modules; consulted by the code generator to
    /// decide whether this global's label is emitted with the `+` export
    /// prefix (`spec.md` section 4.8).
    pub is_exported: bool,
}

/// An IL module: exclusively owns its functions (`spec.md` section 5,
/// "Resource ownership").
#[derive(Debug, Default)]
pub struct Module {
    /// Module name.
    pub name: String,
    /// Functions declared in this module, by name.
    pub functions: FxHashMap<String, Function>,
    /// The module's entry point function name, if it declares one
    /// (conventionally `main`).
    pub entry_point: Option<String>,
    /// Module-level globals.
    pub globals: Vec<Global>,
}

impl Module {
    /// Construct an empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: FxHashMap::default(),
            entry_point: None,
            globals: Vec::new(),
        }
    }

    /// Declare a function, returning the previous function of the same
    /// name if one existed (a duplicate declaration).
    pub fn declare_function(&mut self, f: Function) -> Option<Function> {
        self.functions.insert(f.name.clone(), f)
    }

    /// Iterate over functions in unspecified order. Callers that need a
    /// deterministic build order consult `sixtyc_sema`'s module graph
    /// `compilationOrder` instead.
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }
}
