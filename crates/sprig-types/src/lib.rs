//! Shared types for the sprig rule interpreter.
//!
//! This crate defines the grammar tree (operations, dynamic values and
//! literals), node identity, the small amount of 3-D math the cursor needs,
//! and the error taxonomy shared by the interpreter and scene adapters.

mod error;
pub mod grammar;
pub mod math;

pub use error::{CursorKind, ErrorCategory, EvalResult, InterpretError, SceneError};
pub use grammar::{Arg, Axis, Constant, Op, Sequence, Value, WeightedEntry};
pub use math::{LocalTransform, Mat4, Vec3};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to a node owned by a scene-graph adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
