//! The data dictionary: descriptions of TeX commands, environments, and
//! the modules that bundle them.
//!
//! The dictionaries are pure data, bundled with the tool as TOML files and
//! embedded into the binary. The document model consumes them as an opaque
//! lookup source: a command name resolves to a [`Command`] descriptor
//! carrying an action tag, an argument signature, and documentation.
//!
//! Modules load transitively through a process-wide registry; loading is
//! idempotent and a failed load is negative-cached so a missing module is
//! probed at most once.

pub mod descriptor;
pub mod module;

pub use descriptor::{Action, ArgSpec, ArgSpecKind, Command, Environment, KeySpec, ValueSpec};
pub use module::{load_module, Module};
