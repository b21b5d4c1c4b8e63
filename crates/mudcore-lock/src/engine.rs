//! The lock engine: answers "may `accessor` do `access_type` to `accessed`?".
//!
//! The engine is immutable once built and holds no per-check state, so a
//! single instance behind an `Arc` serves every task concurrently.
//!
//! # Decision order
//!
//! 1. **Superuser bypass.** If a superuser id is configured and the
//!    accessor (or the account puppeting it) has that id, the check
//!    passes without evaluating anything, unless the account is quelling
//!    or the caller asked for [`CheckOptions::no_superuser_bypass`].
//! 2. **Lockdown by default.** No lock for the access type means deny,
//!    and so does a lock whose expression failed to parse.
//! 3. **Evaluation.** The expression is folded left to right; each call
//!    goes through the [`LockFuncRegistry`]. Unknown functions and wrong
//!    argument counts deny that call.

use mudcore_protocol::EntityId;

use crate::lockfuncs::builtin_module;
use crate::parser::{LockExpr, split_clause, split_clauses};
use crate::{
    Entity, LockCall, LockEntry, LockError, LockFuncRegistry, LockSet, PermissionHierarchy,
};

/// Per-check switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Evaluate the lock even for the superuser.
    pub no_superuser_bypass: bool,
}

/// Evaluates locks against the registered lock functions.
#[derive(Debug, Clone)]
pub struct LockEngine {
    registry: LockFuncRegistry,
    hierarchy: PermissionHierarchy,
    superuser: Option<EntityId>,
}

impl LockEngine {
    pub fn new(registry: LockFuncRegistry, hierarchy: PermissionHierarchy) -> Self {
        Self {
            registry,
            hierarchy,
            superuser: None,
        }
    }

    /// Sets the id that bypasses every lock.
    pub fn with_superuser(mut self, superuser: Option<EntityId>) -> Self {
        self.superuser = superuser;
        self
    }

    pub fn registry(&self) -> &LockFuncRegistry {
        &self.registry
    }

    pub fn hierarchy(&self) -> &PermissionHierarchy {
        &self.hierarchy
    }

    pub fn superuser(&self) -> Option<EntityId> {
        self.superuser
    }

    /// Whether `accessor` currently skips lock evaluation.
    ///
    /// True only when a superuser id is configured, it matches the
    /// accessor or its controlling account, and that account is not
    /// quelling.
    pub fn is_bypass(&self, accessor: &dyn Entity) -> bool {
        let Some(superuser) = self.superuser else {
            return false;
        };
        let matches =
            accessor.id() == superuser || accessor.account().is_some_and(|a| a.id() == superuser);
        matches && !accessor.is_quelled()
    }

    /// Checks `access_type` on `accessed`'s locks.
    pub fn check(&self, accessor: &dyn Entity, accessed: &dyn Entity, access_type: &str) -> bool {
        self.check_with(accessor, accessed, access_type, CheckOptions::default())
    }

    /// [`check`](Self::check) with explicit options.
    pub fn check_with(
        &self,
        accessor: &dyn Entity,
        accessed: &dyn Entity,
        access_type: &str,
        options: CheckOptions,
    ) -> bool {
        if !options.no_superuser_bypass && self.is_bypass(accessor) {
            tracing::debug!(
                accessor = %accessor.id(),
                accessed = %accessed.id(),
                access_type,
                "superuser bypass"
            );
            return true;
        }
        self.check_locks(accessed.locks(), accessor, accessed, access_type)
    }

    /// Evaluates a lock-string that isn't stored anywhere.
    ///
    /// With `access_type` set, that clause is used; otherwise the first
    /// clause. The superuser bypass applies as for [`check`](Self::check).
    pub fn check_lockstring(
        &self,
        accessor: &dyn Entity,
        accessed: &dyn Entity,
        lockstring: &str,
        access_type: Option<&str>,
    ) -> bool {
        if self.is_bypass(accessor) {
            tracing::debug!(accessor = %accessor.id(), "superuser bypass (lockstring)");
            return true;
        }
        let locks = LockSet::parse(lockstring);
        let Some(access_type) = access_type.or_else(|| locks.access_types().next()) else {
            return false;
        };
        self.check_locks(&locks, accessor, accessed, access_type)
    }

    /// Syntax check plus registry check (unknown names, argument counts).
    pub fn validate(&self, lockstring: &str) -> Result<(), Vec<LockError>> {
        let mut errors = Vec::new();
        for clause in split_clauses(lockstring) {
            let (access_type, source) = match split_clause(clause) {
                Ok(parts) => parts,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            match LockExpr::parse(access_type, source) {
                Ok(expr) => errors.extend(self.registry.check_expr(access_type, &expr)),
                Err(e) => errors.push(e),
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    fn check_locks(
        &self,
        locks: &LockSet,
        accessor: &dyn Entity,
        accessed: &dyn Entity,
        access_type: &str,
    ) -> bool {
        let expr = match locks.lookup(access_type) {
            LockEntry::Compiled(expr) => expr,
            LockEntry::Missing => {
                tracing::trace!(accessed = %accessed.id(), access_type, "no lock, denying");
                return false;
            }
            LockEntry::Malformed(source) => {
                tracing::debug!(
                    accessed = %accessed.id(),
                    access_type,
                    source,
                    "malformed lock, denying"
                );
                return false;
            }
        };

        let allowed = expr.evaluate(|call| {
            let ctx = LockCall {
                accessor,
                accessed,
                args: &call.args,
                access_type,
                hierarchy: &self.hierarchy,
            };
            self.registry.invoke(call, &ctx)
        });
        tracing::trace!(
            accessor = %accessor.id(),
            accessed = %accessed.id(),
            access_type,
            allowed,
            "lock checked"
        );
        allowed
    }
}

impl Default for LockEngine {
    /// Built-in lock functions, default hierarchy, no superuser.
    fn default() -> Self {
        Self::new(
            LockFuncRegistry::from_modules([builtin_module()]),
            PermissionHierarchy::default(),
        )
    }
}
