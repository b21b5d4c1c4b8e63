//! The permission hierarchy and the rules for resolving who holds what.
//!
//! A hierarchy is an ordered list of permission names, lowest first:
//!
//! ```text
//! Player < Helper < Builder < Admin < Developer
//! ```
//!
//! Holding a hierarchy permission implies holding everything below it.
//! Any permission *not* in the list is an "exact" permission and implies
//! nothing else.
//!
//! # Resolution order
//!
//! When the entity being asked about is a puppet with a controlling
//! account:
//!
//! - hierarchy permissions always resolve through the **account**, so
//!   puppeting a high-permission character never escalates anyone;
//! - exact permissions are checked on the account first and fall back to
//!   the puppet;
//! - while the account is quelling, hierarchy checks use the *lower* of
//!   the account's and the puppet's tiers, and exact checks only look at
//!   the puppet.
//!
//! The account-only checks (`pperm`) never read the puppet's exact
//! permissions, but quelling still caps their tier.

use serde::{Deserialize, Serialize};

use crate::{Entity, Permissions};

/// An ordered permission hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct PermissionHierarchy {
    /// Names as configured, lowest first.
    levels: Vec<String>,
    /// Folded copies used for lookups, see `fold`.
    normalized: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rank {
    AtLeast,
    Above,
}

impl PermissionHierarchy {
    /// Builds a hierarchy from names listed lowest first. Blank and
    /// duplicate (case-insensitive) names are dropped.
    pub fn new<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut hierarchy = Self {
            levels: Vec::new(),
            normalized: Vec::new(),
        };
        for level in levels {
            let level: String = level.into();
            let level = level.trim();
            let folded = fold(level);
            if level.is_empty() || hierarchy.normalized.contains(&folded) {
                continue;
            }
            hierarchy.levels.push(level.to_string());
            hierarchy.normalized.push(folded);
        }
        hierarchy
    }

    /// The configured names, lowest first.
    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// Tier of a permission name, or `None` for exact permissions.
    ///
    /// Lookups ignore case and a trailing plural `s` on either side, so
    /// `"Builders"` finds `"Builder"` and `"Builder"` finds a configured
    /// `"Builders"`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        let folded = fold(name);
        self.normalized.iter().position(|l| *l == folded)
    }

    /// Whether `name` is part of the hierarchy.
    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Highest tier among a set of permissions.
    pub fn max_tier(&self, perms: &Permissions) -> Option<usize> {
        perms.iter().filter_map(|p| self.index_of(p)).max()
    }

    /// `true` if the entity holds `name`, or anything above it when
    /// `name` is a hierarchy permission.
    pub fn holds_at_least(&self, entity: &dyn Entity, name: &str) -> bool {
        self.resolve(entity, name, Rank::AtLeast, false)
    }

    /// `true` if the entity holds a tier strictly above `name`. Always
    /// `false` for exact permissions.
    pub fn holds_above(&self, entity: &dyn Entity, name: &str) -> bool {
        self.resolve(entity, name, Rank::Above, false)
    }

    /// Like [`holds_at_least`](Self::holds_at_least) but only ever
    /// consults the account's own permissions. A quelling account is
    /// still held to the lower of its own and its puppet's tier.
    pub fn account_holds_at_least(&self, entity: &dyn Entity, name: &str) -> bool {
        self.resolve(entity, name, Rank::AtLeast, true)
    }

    /// Like [`holds_above`](Self::holds_above) but account-only.
    pub fn account_holds_above(&self, entity: &dyn Entity, name: &str) -> bool {
        self.resolve(entity, name, Rank::Above, true)
    }

    fn resolve(&self, entity: &dyn Entity, name: &str, rank: Rank, account_only: bool) -> bool {
        let wanted = name.trim();
        if wanted.is_empty() {
            return false;
        }
        let account = entity.account();
        let quelled = entity.is_quelled();

        let Some(required) = self.index_of(wanted) else {
            if rank == Rank::Above {
                return false;
            }
            return match account {
                Some(acc) if account_only => acc.permissions().has(wanted),
                Some(_) if quelled => entity.permissions().has(wanted),
                Some(acc) => acc.permissions().has(wanted) || entity.permissions().has(wanted),
                None => entity.permissions().has(wanted),
            };
        };

        let tier = match account {
            Some(acc) if !quelled => self.max_tier(acc.permissions()),
            Some(acc) => {
                let own = self.max_tier(entity.permissions());
                self.max_tier(acc.permissions()).zip(own).map(|(a, p)| a.min(p))
            }
            None => self.max_tier(entity.permissions()),
        };

        tier.is_some_and(|tier| match rank {
            Rank::AtLeast => tier >= required,
            Rank::Above => tier > required,
        })
    }
}

/// Lowercases and drops one trailing `s`. A lone `"s"` is kept.
fn fold(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match lower.strip_suffix('s') {
        Some(singular) if !singular.is_empty() => singular.to_string(),
        _ => lower,
    }
}

impl Default for PermissionHierarchy {
    fn default() -> Self {
        Self::new(["Player", "Helper", "Builder", "Admin", "Developer"])
    }
}

impl From<Vec<String>> for PermissionHierarchy {
    fn from(levels: Vec<String>) -> Self {
        Self::new(levels)
    }
}

impl From<PermissionHierarchy> for Vec<String> {
    fn from(hierarchy: PermissionHierarchy) -> Self {
        hierarchy.levels
    }
}
