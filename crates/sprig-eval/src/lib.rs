//! Sprig rule interpreter.
//!
//! Interprets a grammar of production rules against a scene graph: a
//! cursor walks named links, templates are instanced with weighted random
//! selection, and local transforms accumulate per link.
//!
//! Evaluation runs in two passes over the whole grammar. **Prepare**
//! validates structure, registers definitions and folds static values;
//! **execute** runs only when prepare reported no errors, and mutates the
//! scene through a [`SceneGraph`] adapter.
//!
//! ```text
//! ops ─▶ prepare ─▶ execute ─▶ generated nodes + errors
//!                     │
//!                     ├── Context (cursor, scopes, captures, definitions)
//!                     ├── RandomSource (seeded, resumable)
//!                     └── SceneGraph (host scene)
//! ```

pub mod config;
pub mod context;
mod instance;
pub mod interpreter;
mod ops;
pub mod random;
pub mod scene;
pub mod selection;
mod value;

pub use config::{ConfigError, InterpretConfig};
pub use context::{Context, Cursor, LinkAliases, LinkCursor};
pub use interpreter::{interpret, parse_sequence, Generation, Interpreter, RunOutcome};
pub use random::{RandomSnapshot, RandomSource, RandomStream, SNAPSHOT_FORMAT};
pub use scene::{MemoryNode, MemoryScene, SceneGraph};
