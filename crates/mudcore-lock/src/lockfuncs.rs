//! Built-in lock functions.
//!
//! | function | allows when |
//! |---|---|
//! | `true()`, `all()` | always |
//! | `false()`, `none()` | never |
//! | `perm(p)` | accessor holds `p` (or above, for hierarchy perms) |
//! | `perm_above(p)` | accessor holds a tier strictly above `p` |
//! | `pperm(p)`, `pperm_above(p)` | as above, account only |
//! | `id(n)`, `dbref(n)` | accessor's id is `n` |
//! | `pid(n)`, `pdbref(n)` | accessor's account id is `n` |
//! | `attr(a[, v])` | accessor has attribute `a` (equal to `v`) |
//! | `attr_gt(a, v)` etc. | accessor's `a` compares to `v` |
//! | `objattr(a[, v])`, `objattr_gt(a, v)` etc. | same, on the accessed entity |
//! | `holds([x])` | accessor carries `x` (or the accessed entity) |
//! | `tag(k[, c])`, `objtag(k[, c])` | accessor / accessed has the tag |
//! | `inside()` | accessor is located in the accessed entity |
//! | `has_account()` | accessor is being puppeted |
//! | `superuser()` | never; superusers pass through the engine bypass |

use std::cmp::Ordering;

use mudcore_protocol::EntityId;

use crate::{Entity, LockCall, LockFuncModule};

/// Registry name of the built-in module.
pub const BUILTIN_MODULE: &str = "mudcore.lockfuncs";

const ANY: std::ops::RangeInclusive<usize> = 0..=usize::MAX;

/// The built-in lock functions as a module, ready to register first.
pub fn builtin_module() -> LockFuncModule {
    let module = LockFuncModule::new(BUILTIN_MODULE)
        .function("true", ANY, |_| true)
        .alias("all", "true")
        .function("false", ANY, |_| false)
        .alias("none", "false")
        .function("superuser", ANY, |_| false)
        .function("perm", 1..=1, |c| perm_arg(c).is_some_and(|p| c.hierarchy.holds_at_least(c.accessor, p)))
        .function("perm_above", 1..=1, |c| perm_arg(c).is_some_and(|p| c.hierarchy.holds_above(c.accessor, p)))
        .function("pperm", 1..=1, |c| {
            perm_arg(c).is_some_and(|p| c.hierarchy.account_holds_at_least(c.accessor, p))
        })
        .function("pperm_above", 1..=1, |c| {
            perm_arg(c).is_some_and(|p| c.hierarchy.account_holds_above(c.accessor, p))
        })
        .function("id", 1..=1, |c| dbref_arg(c).is_some_and(|id| c.accessor.id() == id))
        .alias("dbref", "id")
        .function("pid", 1..=1, |c| {
            let account = c.accessor.account().map_or(c.accessor.id(), |a| a.id());
            dbref_arg(c).is_some_and(|id| account == id)
        })
        .alias("pdbref", "pid")
        .function("attr", 1..=2, |c| attr_check(c, c.accessor, Cmp::Eq))
        .function("objattr", 1..=2, |c| attr_check(c, c.accessed, Cmp::Eq))
        .function("holds", 0..=1, holds)
        .function("tag", 1..=2, |c| tag_check(c, c.accessor))
        .function("objtag", 1..=2, |c| tag_check(c, c.accessed))
        .function("inside", 0..=0, |c| c.accessor.location() == Some(c.accessed.id()))
        .function("has_account", 0..=0, |c| c.accessor.account().is_some());

    COMPARISONS.iter().fold(module, |module, (suffix, cmp)| {
        let cmp = *cmp;
        module
            .function(&format!("attr_{suffix}"), 2..=2, move |c| attr_check(c, c.accessor, cmp))
            .function(&format!("objattr_{suffix}"), 2..=2, move |c| attr_check(c, c.accessed, cmp))
    })
}

/// How an `attr*` call compares the stored value with its literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cmp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Cmp {
    fn accepts(self, ord: Ordering) -> bool {
        match self {
            Self::Eq => ord.is_eq(),
            Self::Ne => ord.is_ne(),
            Self::Gt => ord.is_gt(),
            Self::Ge => ord.is_ge(),
            Self::Lt => ord.is_lt(),
            Self::Le => ord.is_le(),
        }
    }

    fn needs_order(self) -> bool {
        !matches!(self, Self::Eq | Self::Ne)
    }
}

const COMPARISONS: [(&str, Cmp); 6] = [
    ("eq", Cmp::Eq),
    ("ne", Cmp::Ne),
    ("gt", Cmp::Gt),
    ("ge", Cmp::Ge),
    ("lt", Cmp::Lt),
    ("le", Cmp::Le),
];

fn perm_arg<'a>(c: &'a LockCall<'_>) -> Option<&'a str> {
    c.arg(0).filter(|p| !p.is_empty())
}

fn dbref_arg(c: &LockCall<'_>) -> Option<EntityId> {
    c.arg(0)?.parse().ok()
}

/// `attr(name)` tests presence; `attr(name, value)` and the comparison
/// variants compare the stored value against the literal. Ordering
/// comparisons on booleans deny.
fn attr_check(c: &LockCall<'_>, target: &dyn Entity, cmp: Cmp) -> bool {
    let Some(name) = c.arg(0) else {
        return false;
    };
    let Some(value) = target.attribute(name) else {
        return false;
    };
    match c.arg(1) {
        None => true,
        Some(_) if cmp.needs_order() && !value.is_ordered() => false,
        Some(literal) => value.compare_literal(literal).is_some_and(|ord| cmp.accepts(ord)),
    }
}

fn holds(c: &LockCall<'_>) -> bool {
    match c.arg(0) {
        None => c.accessor.contents().iter().any(|e| e.id == c.accessed.id()),
        Some(needle) => c.accessor.contents().iter().any(|e| e.matches(needle)),
    }
}

fn tag_check(c: &LockCall<'_>, target: &dyn Entity) -> bool {
    c.arg(0).is_some_and(|key| target.has_tag(key, c.arg(1)))
}
