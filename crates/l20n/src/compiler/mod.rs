//! The expression compiler and evaluation runtime.
//!
//! [`compile`] turns a parsed document into an [`Env`] of lazily evaluated
//! entries. Evaluation distinguishes two operations: *evaluating* an
//! expression calls it once and may yield a reference (to an entity, an
//! attribute, or a macro) that other expressions can dereference further;
//! *resolving* repeatedly evaluates until a primitive string, number, or
//! boolean is produced. Hash branch selection, the `~` self-reference, and
//! cycle detection all live here.

mod entries;
mod error;
mod expr;
mod plural;
mod scope;

pub use entries::{Attribute, Entity, EntityValue, Entry, Env, MacroEntry, compile};
pub use error::{
    CompilationError, IndexError, RuntimeError, ValueError, compute_suggestions,
};
pub use plural::plural_category;
pub use scope::Scope;
