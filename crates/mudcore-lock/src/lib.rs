//! Lock-strings and the engine that evaluates them.
//!
//! A lock-string maps access types to boolean expressions over lock
//! functions:
//!
//! ```text
//! get: perm(Builder) OR holds(brass key); puppet: pid(#3); delete: false()
//! ```
//!
//! Entities carry a compiled [`LockSet`]. The [`LockEngine`] checks an
//! access type against it, calling functions from its
//! [`LockFuncRegistry`] and resolving permissions through the
//! [`PermissionHierarchy`].
//!
//! ```
//! use mudcore_lock::{EntityRecord, LockEngine, LockSet};
//! use mudcore_protocol::EntityId;
//!
//! let engine = LockEngine::default();
//! let mut chest = EntityRecord::new(EntityId(10), "chest");
//! chest.locks = LockSet::parse("open: perm(Builder)");
//!
//! let builder = EntityRecord::new(EntityId(2), "Bob").with_permission("Builder");
//! let player = EntityRecord::new(EntityId(3), "Ann").with_permission("Player");
//!
//! assert!(engine.check(&builder, &chest, "open"));
//! assert!(!engine.check(&player, &chest, "open"));
//! assert!(!engine.check(&builder, &chest, "smash")); // no lock, no access
//! ```

mod attributes;
mod engine;
mod entity;
mod error;
mod hierarchy;
mod lockfuncs;
mod lockset;
pub mod parser;
mod perms;
mod registry;

pub use attributes::{AttrValue, Attributes};
pub use engine::{CheckOptions, LockEngine};
pub use entity::{ContentEntry, Entity, EntityRecord, Tag};
pub use error::LockError;
pub use hierarchy::PermissionHierarchy;
pub use lockfuncs::{BUILTIN_MODULE, builtin_module};
pub use lockset::{LockEntry, LockSet};
pub use parser::{FuncCall, Joiner, LockExpr, Term};
pub use perms::Permissions;
pub use registry::{LockCall, LockFn, LockFunc, LockFuncModule, LockFuncRegistry};
