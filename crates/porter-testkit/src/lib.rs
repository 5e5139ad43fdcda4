//! In-memory collaborators and fixtures for exercising the gateway without
//! a storage engine.

mod collaborators;
mod eval;
pub mod fixtures;
mod memory;

pub use collaborators::{ForeignKeyRelationFilter, StaticAuthorizer, StaticScope};
pub use eval::{compare, compare_records, lookup, matches};
pub use memory::{Execution, FormRequest, MemoryCollection, MemoryRegistry, project};
