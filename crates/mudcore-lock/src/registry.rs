//! The lock-function registry.
//!
//! Lock functions are the predicates lock expressions call. They are
//! grouped into named [`LockFuncModule`]s and registered in order at
//! startup; a later module's function replaces an earlier one with the
//! same name, which is how a game overrides a built-in.

use std::collections::HashMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::parser::{FuncCall, LockExpr};
use crate::{Entity, LockError, PermissionHierarchy};

/// Everything a lock function gets to look at.
pub struct LockCall<'a> {
    /// Who is asking.
    pub accessor: &'a dyn Entity,
    /// What is being accessed.
    pub accessed: &'a dyn Entity,
    /// Literal arguments from the lock expression.
    pub args: &'a [String],
    /// The access type being checked (`"get"`, `"puppet"`, ...).
    pub access_type: &'a str,
    /// The configured permission hierarchy.
    pub hierarchy: &'a PermissionHierarchy,
}

impl LockCall<'_> {
    /// Argument `index`, trimmed.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(|a| a.trim())
    }
}

/// Signature of a lock function body. Must not panic; anything it can't
/// make sense of should return `false`.
pub type LockFn = dyn Fn(&LockCall<'_>) -> bool + Send + Sync;

/// A named lock function with its accepted argument count.
#[derive(Clone)]
pub struct LockFunc {
    name: String,
    arity: RangeInclusive<usize>,
    func: Arc<LockFn>,
}

impl LockFunc {
    pub fn new(
        name: &str,
        arity: RangeInclusive<usize>,
        func: impl Fn(&LockCall<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.trim().to_lowercase(),
            arity,
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accepts(&self, args: usize) -> bool {
        self.arity.contains(&args)
    }
}

impl fmt::Debug for LockFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFunc")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// An ordered group of lock functions registered together.
#[derive(Debug, Clone)]
pub struct LockFuncModule {
    name: String,
    funcs: Vec<LockFunc>,
}

impl LockFuncModule {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            funcs: Vec::new(),
        }
    }

    /// Adds a function to the module.
    pub fn function(
        mut self,
        name: &str,
        arity: RangeInclusive<usize>,
        func: impl Fn(&LockCall<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.funcs.push(LockFunc::new(name, arity, func));
        self
    }

    /// Registers an existing function under another name.
    pub fn alias(mut self, alias: &str, target: &str) -> Self {
        let target = target.trim().to_lowercase();
        if let Some(found) = self.funcs.iter().find(|f| f.name == target).cloned() {
            self.funcs.push(LockFunc {
                name: alias.trim().to_lowercase(),
                ..found
            });
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }
}

/// Name → lock function map, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct LockFuncRegistry {
    funcs: HashMap<String, LockFunc>,
    modules: Vec<String>,
}

impl LockFuncRegistry {
    /// An empty registry. Every call against it denies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers modules in order.
    pub fn from_modules(modules: impl IntoIterator<Item = LockFuncModule>) -> Self {
        let mut registry = Self::new();
        for module in modules {
            registry.register_module(module);
        }
        registry
    }

    /// Registers every function in `module`, replacing same-named ones.
    pub fn register_module(&mut self, module: LockFuncModule) {
        for func in module.funcs {
            if self.funcs.contains_key(&func.name) {
                tracing::debug!(
                    module = %module.name,
                    function = %func.name,
                    "lock function overridden"
                );
            }
            self.funcs.insert(func.name.clone(), func);
        }
        tracing::debug!(module = %module.name, total = self.funcs.len(), "lock module registered");
        self.modules.push(module.name);
    }

    pub fn get(&self, name: &str) -> Option<&LockFunc> {
        self.funcs.get(&name.trim().to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Module names in registration order.
    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    /// Runs one call. Unknown functions and bad argument counts deny and
    /// are logged; they never propagate.
    pub(crate) fn invoke(&self, call: &FuncCall, ctx: &LockCall<'_>) -> bool {
        let Some(func) = self.funcs.get(&call.name) else {
            tracing::warn!(
                function = %call.name,
                access_type = ctx.access_type,
                accessed = %ctx.accessed.id(),
                "unknown lock function, denying"
            );
            return false;
        };
        if !func.accepts(call.args.len()) {
            tracing::warn!(
                function = %call.name,
                given = call.args.len(),
                access_type = ctx.access_type,
                "lock function called with wrong number of arguments, denying"
            );
            return false;
        }
        (func.func)(ctx)
    }

    /// Static checks on a compiled expression: unknown names and
    /// argument counts.
    pub fn check_expr(&self, access_type: &str, expr: &LockExpr) -> Vec<LockError> {
        expr.calls()
            .filter_map(|call| match self.funcs.get(&call.name) {
                None => Some(LockError::UnknownFunction {
                    access_type: access_type.to_string(),
                    name: call.name.clone(),
                }),
                Some(func) if !func.accepts(call.args.len()) => Some(LockError::Arity {
                    name: call.name.clone(),
                    given: call.args.len(),
                }),
                Some(_) => None,
            })
            .collect()
    }
}
