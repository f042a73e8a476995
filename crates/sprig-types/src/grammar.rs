//! Grammar tree: operations, dynamic values, and literal constants.
//!
//! A grammar arrives fully materialized as a sequence of [`Op`]s. Every
//! operation argument is an [`Arg`]: either a literal [`Constant`] or a
//! dynamic [`Value`] resolved at execute time. Nested sequences are shared
//! through [`Sequence`] so definitions can be registered without copying.
//!
//! The serde representation is the interchange format for grammars:
//!
//! ```text
//! [{"op": "instance", "name": "floor"},
//!  {"op": "repeat", "count": {"value": "range", "min": 1, "max": 3},
//!   "body": [{"op": "move_to_link", "name": "top"}, {"op": "instance", "name": "floor"}]}]
//! ```

use crate::math::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// A shared, immutable sequence of operations.
pub type Sequence = Rc<[Op]>;

// ══════════════════════════════════════════════════════════════════════════════
// Constants
// ══════════════════════════════════════════════════════════════════════════════

/// A literal scalar (or list of scalars) in the grammar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constant {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Constant>),
}

impl Constant {
    /// Short type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric view: ints widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// A list of exactly three numbers.
    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Self::List(items) if items.len() == 3 => Some(Vec3::new(
                items[0].as_f64()?,
                items[1].as_f64()?,
                items[2].as_f64()?,
            )),
            _ => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for Constant {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Constant {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Constant {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for Constant {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for Constant {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec3> for Constant {
    fn from(v: Vec3) -> Self {
        Self::List(v.to_array().into_iter().map(Constant::Float).collect())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Arguments & Values
// ══════════════════════════════════════════════════════════════════════════════

/// An operation argument: a literal, or a value computed at execute time.
///
/// Literals are tried first when deserializing. `Value` is internally
/// tagged, and serde also accepts such enums in sequence form, so a list
/// like `[0, 0, 1]` would otherwise read as a range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    Constant(Constant),
    Dynamic(Value),
}

impl Arg {
    /// The literal, if this argument is not dynamic.
    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Self::Constant(c) => Some(c),
            Self::Dynamic(_) => None,
        }
    }

    /// A literal 3-vector argument.
    pub fn vec3(x: f64, y: f64, z: f64) -> Self {
        Self::Constant(Vec3::new(x, y, z).into())
    }
}

impl From<Constant> for Arg {
    fn from(value: Constant) -> Self {
        Self::Constant(value)
    }
}

macro_rules! arg_from_literal {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Self::Constant(value.into())
                }
            }
        )*
    };
}

arg_from_literal!(&str, String, i64, f64, bool, Vec3);

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Self::Dynamic(value)
    }
}

/// One `(weight, value)` pair of a [`Value::Weighted`] choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedEntry(pub Constant, pub Arg);

/// A dynamic grammar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "value", rename_all = "snake_case")]
pub enum Value {
    /// Uniform integer in `[min, max]`.
    Range { min: Constant, max: Constant },
    /// Weighted choice; the first entry whose running weight reaches the
    /// threshold wins.
    Weighted { entries: Vec<WeightedEntry> },
    /// Resolved once during prepare, then replayed.
    Static { of: Box<Arg> },
}

impl Value {
    pub fn range(min: i64, max: i64) -> Self {
        Self::Range {
            min: Constant::Int(min),
            max: Constant::Int(max),
        }
    }

    pub fn weighted<W, A>(entries: impl IntoIterator<Item = (W, A)>) -> Self
    where
        W: Into<Constant>,
        A: Into<Arg>,
    {
        Self::Weighted {
            entries: entries
                .into_iter()
                .map(|(w, a)| WeightedEntry(w.into(), a.into()))
                .collect(),
        }
    }

    pub fn fixed(of: impl Into<Arg>) -> Self {
        Self::Static {
            of: Box::new(of.into()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Range { .. } => "range",
            Self::Weighted { .. } => "weighted",
            Self::Static { .. } => "static",
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Operations
// ══════════════════════════════════════════════════════════════════════════════

/// Coordinate axis used for mirroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Scale vector that mirrors across this axis.
    pub fn mirror_scale(self) -> Vec3 {
        match self {
            Self::X => Vec3::new(-1.0, 1.0, 1.0),
            Self::Y => Vec3::new(1.0, -1.0, 1.0),
            Self::Z => Vec3::new(1.0, 1.0, -1.0),
        }
    }
}

/// One interpreter instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Register a named, reusable sequence.
    Define { name: String, body: Sequence },
    /// Publish the current link under an alias for the enclosing definition.
    ExportLink { alias: Arg },
    /// Run `body`, then restore the cursor.
    Scope { body: Sequence },
    /// Run `body` `count` times.
    Repeat { count: Arg, body: Sequence },
    /// Instantiate a definition or a template collection at the current link.
    Instance { name: Arg },
    /// Duplicate the children of a sibling link under the current link.
    CopyParentLinkChildren {
        link: Arg,
        #[serde(default)]
        mirror: Option<Axis>,
    },
    /// Add a marker link under the current object.
    CreateLink { name: Arg },
    /// Move the cursor to a visible link.
    MoveToLink { name: Arg },
    /// Run `body` at every visible link whose name matches `pattern`.
    EachLink { pattern: String, body: Sequence },
    /// Run `body` with probability `ratio`.
    Maybe { ratio: Arg, body: Sequence },
    Move {
        vector: Arg,
        #[serde(default)]
        absolute: bool,
    },
    Rotate {
        euler: Arg,
        #[serde(default)]
        absolute: bool,
    },
    Scale {
        vector: Arg,
        #[serde(default)]
        absolute: bool,
    },
}

impl Op {
    /// The operation's grammar name, used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Define { .. } => "define",
            Self::ExportLink { .. } => "export_link",
            Self::Scope { .. } => "scope",
            Self::Repeat { .. } => "repeat",
            Self::Instance { .. } => "instance",
            Self::CopyParentLinkChildren { .. } => "copy_parent_link_children",
            Self::CreateLink { .. } => "create_link",
            Self::MoveToLink { .. } => "move_to_link",
            Self::EachLink { .. } => "each_link",
            Self::Maybe { .. } => "maybe",
            Self::Move { .. } => "move",
            Self::Rotate { .. } => "rotate",
            Self::Scale { .. } => "scale",
        }
    }

    // ── Builders ─────────────────────────────────────────────────────────

    pub fn define(name: impl Into<String>, body: Vec<Op>) -> Self {
        Self::Define {
            name: name.into(),
            body: body.into(),
        }
    }

    pub fn export_link(alias: impl Into<Arg>) -> Self {
        Self::ExportLink {
            alias: alias.into(),
        }
    }

    pub fn scope(body: Vec<Op>) -> Self {
        Self::Scope { body: body.into() }
    }

    pub fn repeat(count: impl Into<Arg>, body: Vec<Op>) -> Self {
        Self::Repeat {
            count: count.into(),
            body: body.into(),
        }
    }

    pub fn instance(name: impl Into<Arg>) -> Self {
        Self::Instance { name: name.into() }
    }

    pub fn copy_parent_link_children(link: impl Into<Arg>, mirror: Option<Axis>) -> Self {
        Self::CopyParentLinkChildren {
            link: link.into(),
            mirror,
        }
    }

    pub fn create_link(name: impl Into<Arg>) -> Self {
        Self::CreateLink { name: name.into() }
    }

    pub fn move_to_link(name: impl Into<Arg>) -> Self {
        Self::MoveToLink { name: name.into() }
    }

    pub fn each_link(pattern: impl Into<String>, body: Vec<Op>) -> Self {
        Self::EachLink {
            pattern: pattern.into(),
            body: body.into(),
        }
    }

    pub fn maybe(ratio: impl Into<Arg>, body: Vec<Op>) -> Self {
        Self::Maybe {
            ratio: ratio.into(),
            body: body.into(),
        }
    }

    pub fn translate(vector: impl Into<Arg>, absolute: bool) -> Self {
        Self::Move {
            vector: vector.into(),
            absolute,
        }
    }

    pub fn rotate(euler: impl Into<Arg>, absolute: bool) -> Self {
        Self::Rotate {
            euler: euler.into(),
            absolute,
        }
    }

    pub fn scale(vector: impl Into<Arg>, absolute: bool) -> Self {
        Self::Scale {
            vector: vector.into(),
            absolute,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn constant_numeric_views() {
        assert_eq!(Constant::Int(3).as_f64(), Some(3.0));
        assert_eq!(Constant::Float(0.5).as_int(), None);
        assert_eq!(Constant::from("a").as_f64(), None);
    }

    #[test]
    fn constant_vec3_requires_three_numbers() {
        let ok = Constant::List(vec![Constant::Int(1), Constant::Float(2.5), Constant::Int(-1)]);
        assert_eq!(ok.as_vec3(), Some(Vec3::new(1.0, 2.5, -1.0)));

        let short = Constant::List(vec![Constant::Int(1), Constant::Int(2)]);
        assert_eq!(short.as_vec3(), None);

        let mixed = Constant::List(vec![Constant::Int(1), Constant::from("y"), Constant::Int(2)]);
        assert_eq!(mixed.as_vec3(), None);
    }

    #[test]
    fn grammar_from_json() {
        let json = r#"[
            {"op": "define", "name": "tower", "body": [
                {"op": "instance", "name": "floor"},
                {"op": "export_link", "alias": "top"}
            ]},
            {"op": "repeat", "count": {"value": "range", "min": 1, "max": 3}, "body": [
                {"op": "instance", "name": {"value": "weighted", "entries": [[1, "a"], [3.5, "b"]]}}
            ]},
            {"op": "copy_parent_link_children", "link": "left", "mirror": "x"},
            {"op": "move", "vector": [0, 0, 1.5]}
        ]"#;
        let ops: Vec<Op> = serde_json::from_str(json).unwrap();
        assert_eq!(ops.len(), 4);
        assert_eq!(
            ops[0],
            Op::define(
                "tower",
                vec![Op::instance("floor"), Op::export_link("top")]
            )
        );
        assert_eq!(
            ops[1],
            Op::repeat(
                Value::range(1, 3),
                vec![Op::instance(Value::weighted([
                    (Constant::Int(1), "a"),
                    (Constant::Float(3.5), "b"),
                ]))]
            )
        );
        assert_eq!(ops[2], Op::copy_parent_link_children("left", Some(Axis::X)));
        assert_eq!(
            ops[3],
            Op::Move {
                vector: Arg::Constant(Constant::List(vec![
                    Constant::Int(0),
                    Constant::Int(0),
                    Constant::Float(1.5)
                ])),
                absolute: false,
            }
        );
    }

    #[test]
    fn integer_lists_stay_literal() {
        let ops: Vec<Op> = serde_json::from_str(
            r#"[{"op": "move", "vector": [0, 0, 1]},
                {"op": "scale", "vector": [1, 2, 3]},
                {"op": "instance", "name": {"value": "weighted", "entries": [[1, [0, 4, 5]]]}}]"#,
        )
        .unwrap();
        let ints = |a, b, c| {
            Arg::Constant(Constant::List(vec![
                Constant::Int(a),
                Constant::Int(b),
                Constant::Int(c),
            ]))
        };
        assert_eq!(
            ops[0],
            Op::Move {
                vector: ints(0, 0, 1),
                absolute: false,
            }
        );
        assert_eq!(
            ops[1],
            Op::Scale {
                vector: ints(1, 2, 3),
                absolute: false,
            }
        );
        assert_eq!(
            ops[2],
            Op::instance(Value::Weighted {
                entries: vec![WeightedEntry(Constant::Int(1), ints(0, 4, 5))],
            })
        );
    }

    #[test]
    fn grammar_json_is_stable() {
        let ops = vec![
            Op::maybe(0.5, vec![Op::move_to_link("door")]),
            Op::each_link("^win", vec![Op::instance(Value::fixed(Value::range(0, 2)))]),
        ];
        let first = serde_json::to_string(&ops).unwrap();
        let back: Vec<Op> = serde_json::from_str(&first).unwrap();
        assert_eq!(back, ops);
        assert_eq!(serde_json::to_string(&back).unwrap(), first);
    }

    #[test]
    fn op_names() {
        assert_eq!(Op::instance("x").name(), "instance");
        assert_eq!(Op::translate(Arg::vec3(0.0, 0.0, 0.0), false).name(), "move");
        assert_eq!(Op::create_link("l").name(), "create_link");
    }
}
