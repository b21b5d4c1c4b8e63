//! Permission strings held by an entity.

use serde::{Deserialize, Serialize};

/// An ordered, case-insensitive set of permission strings.
///
/// Insertion order is kept so listings look the way an admin typed them,
/// but membership ignores case: `"Builder"` and `"builder"` are the same
/// permission and only the first spelling is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions {
    perms: Vec<String>,
}

impl Permissions {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a permission. Returns `false` if it was already held.
    pub fn add(&mut self, perm: impl Into<String>) -> bool {
        let perm = perm.into();
        let perm = perm.trim();
        if perm.is_empty() || self.has(perm) {
            return false;
        }
        self.perms.push(perm.to_string());
        true
    }

    /// Removes a permission. Returns `false` if it was not held.
    pub fn remove(&mut self, perm: &str) -> bool {
        let before = self.perms.len();
        self.perms.retain(|p| !p.eq_ignore_ascii_case(perm.trim()));
        self.perms.len() != before
    }

    /// Exact (case-insensitive) membership. No hierarchy logic.
    pub fn has(&self, perm: &str) -> bool {
        let perm = perm.trim();
        self.perms.iter().any(|p| p.eq_ignore_ascii_case(perm))
    }

    /// Removes every permission.
    pub fn clear(&mut self) {
        self.perms.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.perms.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.perms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.perms.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Permissions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut perms = Self::new();
        for perm in iter {
            perms.add(perm);
        }
        perms
    }
}
