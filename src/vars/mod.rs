//! Variable resolution.
//!
//! [`VariableStore::var`] supplies configuration values to dependency
//! bodies.  When no value has been set for the current run it walks the
//! default chain, in order:
//!
//! 1. a computed default, re-evaluated on every read,
//! 2. the value saved by the previous run,
//! 3. a reference to another variable, replayed through the saved
//!    per-reference mapping when one exists,
//! 4. the literal default.
//!
//! and then asks the [`Prompter`] unless prompting was disabled for the read.
pub mod definition;
pub mod persist;
pub mod prompt;
pub mod store;
pub mod value;

pub use definition::{PromptKind, VarDefault, VarDefinition, VarOpts};
pub use persist::{SavedVar, SavedVars};
pub use prompt::{DialoguerPrompter, PromptRequest, Prompter};
pub use store::VariableStore;
pub use value::{Computed, VarValue};
