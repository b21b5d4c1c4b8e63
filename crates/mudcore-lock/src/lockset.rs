//! The compiled locks stored on one entity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::LockError;
use crate::parser::{Joiner, LockExpr, split_clause, split_clauses};

/// One access type's lock.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LockDef {
    access_type: String,
    source: String,
    /// `None` when the source failed to parse. Such locks always deny.
    expr: Option<LockExpr>,
}

/// What a [`LockSet`] holds for an access type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockEntry<'a> {
    /// No lock for this access type. Checks deny.
    Missing,
    /// A lock exists but its expression is broken. Checks deny.
    Malformed(&'a str),
    /// A usable lock.
    Compiled(&'a LockExpr),
}

/// Access-type → lock expression map for a single entity.
///
/// Built from lock-strings such as `"get: perm(Builder); drop: true()"`.
/// Adding a clause for an access type that already has a lock replaces
/// it, and within one lock-string the last clause for a type wins.
///
/// Parsing is forgiving: a clause that fails to parse is kept as an
/// always-deny lock for its access type and reported, while every other
/// clause still compiles. Persisted as its lock-string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct LockSet {
    locks: Vec<LockDef>,
}

impl LockSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles a lock-string, logging any broken clauses.
    pub fn parse(lockstring: &str) -> Self {
        let mut set = Self::new();
        set.add(lockstring);
        set
    }

    /// Strictly checks a lock-string's syntax, returning every problem.
    pub fn validate(lockstring: &str) -> Result<(), Vec<LockError>> {
        let errors: Vec<LockError> = split_clauses(lockstring)
            .into_iter()
            .filter_map(|clause| match split_clause(clause) {
                Ok((access_type, source)) => LockExpr::parse(access_type, source).err(),
                Err(e) => Some(e),
            })
            .collect();
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Merges a lock-string into the set.
    ///
    /// Returns the problems found; broken clauses with a readable access
    /// type are still stored (as always-deny), clauses without one are
    /// skipped.
    pub fn add(&mut self, lockstring: &str) -> Vec<LockError> {
        let mut errors = Vec::new();
        for clause in split_clauses(lockstring) {
            let (access_type, source) = match split_clause(clause) {
                Ok(parts) => parts,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping lock clause");
                    errors.push(e);
                    continue;
                }
            };
            let expr = match LockExpr::parse(access_type, source) {
                Ok(expr) => Some(expr),
                Err(e) => {
                    tracing::warn!(
                        access_type,
                        error = %e,
                        "malformed lock, access type will deny"
                    );
                    errors.push(e);
                    None
                }
            };
            self.insert(LockDef {
                access_type: access_type.to_string(),
                source: expr.as_ref().map_or_else(|| source.to_string(), ToString::to_string),
                expr,
            });
        }
        errors
    }

    /// Clears the set, then adds `lockstring`.
    pub fn replace(&mut self, lockstring: &str) -> Vec<LockError> {
        self.clear();
        self.add(lockstring)
    }

    /// Combines `expression` with the existing lock for `access_type`
    /// (`existing <joiner> expression`), or sets it if there is none.
    ///
    /// Unlike [`add`](Self::add) this is strict: a broken expression is
    /// rejected and the set is left untouched. An existing broken lock is
    /// overwritten.
    pub fn append(
        &mut self,
        access_type: &str,
        expression: &str,
        joiner: Joiner,
    ) -> Result<(), LockError> {
        let access_type = access_type.trim();
        let addition = LockExpr::parse(access_type, expression)?;
        let expr = match self.lookup(access_type) {
            LockEntry::Compiled(existing) => existing.clone().join(joiner, addition),
            LockEntry::Missing | LockEntry::Malformed(_) => addition,
        };
        self.insert(LockDef {
            access_type: access_type.to_string(),
            source: expr.to_string(),
            expr: Some(expr),
        });
        Ok(())
    }

    /// Removes the lock for an access type.
    pub fn remove(&mut self, access_type: &str) -> bool {
        let before = self.locks.len();
        self.locks.retain(|d| d.access_type != access_type.trim());
        self.locks.len() != before
    }

    pub fn clear(&mut self) {
        self.locks.clear();
    }

    /// The lock's expression text. Compiled locks come back in canonical
    /// form (`OR`/`AND` uppercased, args normalised); broken ones as written.
    pub fn get(&self, access_type: &str) -> Option<&str> {
        self.find(access_type).map(|d| d.source.as_str())
    }

    /// The compiled state of an access type's lock.
    pub fn lookup(&self, access_type: &str) -> LockEntry<'_> {
        match self.find(access_type) {
            None => LockEntry::Missing,
            Some(LockDef { expr: Some(expr), .. }) => LockEntry::Compiled(expr),
            Some(LockDef { source, .. }) => LockEntry::Malformed(source),
        }
    }

    /// Access types in the order they were first added.
    pub fn access_types(&self) -> impl Iterator<Item = &str> {
        self.locks.iter().map(|d| d.access_type.as_str())
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Canonical lock-string. Broken locks keep their original text so
    /// nothing is lost on save.
    pub fn to_lockstring(&self) -> String {
        self.to_string()
    }

    fn find(&self, access_type: &str) -> Option<&LockDef> {
        let access_type = access_type.trim();
        self.locks.iter().find(|d| d.access_type == access_type)
    }

    fn insert(&mut self, def: LockDef) {
        match self.locks.iter_mut().find(|d| d.access_type == def.access_type) {
            Some(slot) => *slot = def,
            None => self.locks.push(def),
        }
    }
}

impl fmt::Display for LockSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, def) in self.locks.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", def.access_type, def.source)?;
        }
        Ok(())
    }
}

impl From<String> for LockSet {
    fn from(lockstring: String) -> Self {
        Self::parse(&lockstring)
    }
}

impl From<LockSet> for String {
    fn from(set: LockSet) -> Self {
        set.to_lockstring()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_last_clause_wins_for_same_access_type() {
        let set = LockSet::parse("get: false(); get: true()");
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("get"), Some("true()"));
    }

    #[test]
    fn test_add_replaces_existing_access_type_in_place() {
        let mut set = LockSet::parse("get: true(); drop: true()");
        set.add("get: perm(Builder)");
        assert_eq!(set.to_lockstring(), "get: perm(Builder); drop: true()");
    }

    #[test]
    fn test_add_keeps_malformed_clause_as_deny_and_others_working() {
        let mut set = LockSet::new();
        let errors = set.add("get: perm(Builder; drop: true()");
        assert_eq!(errors.len(), 1);
        assert!(matches!(set.lookup("get"), LockEntry::Malformed("perm(Builder")));
        assert!(matches!(set.lookup("drop"), LockEntry::Compiled(_)));
        assert_eq!(set.lookup("look"), LockEntry::Missing);
    }

    #[test]
    fn test_add_skips_clause_without_access_type() {
        let mut set = LockSet::new();
        let errors = set.add("perm(Builder); drop: true()");
        assert!(matches!(errors[0], LockError::MissingAccessType(_)));
        assert_eq!(set.access_types().collect::<Vec<_>>(), vec!["drop"]);
    }

    #[test]
    fn test_replace_drops_previous_locks() {
        let mut set = LockSet::parse("get: true(); drop: true()");
        set.replace("edit: perm(Admin)");
        assert_eq!(set.access_types().collect::<Vec<_>>(), vec!["edit"]);
    }

    #[test]
    fn test_append_joins_with_existing() {
        let mut set = LockSet::parse("edit: perm(Admin)");
        set.append("edit", "id(12)", Joiner::Or).unwrap();
        assert_eq!(set.get("edit"), Some("perm(Admin) OR id(12)"));
        set.append("view", "true()", Joiner::And).unwrap();
        assert_eq!(set.get("view"), Some("true()"));
    }

    #[test]
    fn test_append_rejects_broken_expression() {
        let mut set = LockSet::parse("edit: perm(Admin)");
        assert!(set.append("edit", "id(", Joiner::Or).is_err());
        assert_eq!(set.get("edit"), Some("perm(Admin)"));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut set = LockSet::parse("get: true(); drop: true()");
        assert!(set.remove("get"));
        assert!(!set.remove("get"));
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let errors = LockSet::validate("get: ; perm(x); drop: true() OR").unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(LockSet::validate("get: true(); drop: not false()").is_ok());
    }

    #[test]
    fn test_lockstring_round_trips_through_parse() {
        let set = LockSet::parse("get:perm(Builder) or holds('brass key');puppet: id(#4)");
        let again = LockSet::parse(&set.to_lockstring());
        assert_eq!(set, again);
    }

    #[test]
    fn test_serde_reload_keeps_empty_quoted_arg_compiled() {
        let set = LockSet::parse("get: attr(title, '')");
        let json = serde_json::to_string(&set).unwrap();
        let back: LockSet = serde_json::from_str(&json).unwrap();
        assert!(matches!(back.lookup("get"), LockEntry::Compiled(_)));
        assert_eq!(back, set);
    }

    #[test]
    fn test_serde_stores_lockstring_text() {
        let set = LockSet::parse("get: true()");
        assert_eq!(serde_json::to_string(&set).unwrap(), r#""get: true()""#);
        let back: LockSet = serde_json::from_str(r#""drop: perm(Admin)""#).unwrap();
        assert_eq!(back.get("drop"), Some("perm(Admin)"));
    }
}
