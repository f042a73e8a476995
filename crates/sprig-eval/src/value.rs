//! Preparation and evaluation of grammar values and arguments.

use crate::context::Context;
use crate::selection::first_reaching;
use sprig_types::{Arg, Constant, EvalResult, InterpretError, Value, Vec3};

/// The shape an argument must have once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
    /// A string (names, aliases).
    Text,
    /// A non-negative integer (repeat counts).
    Count,
    /// Any number.
    Number,
    /// A list of three numbers.
    Vector,
}

impl Shape {
    fn describe(self) -> &'static str {
        match self {
            Self::Text => "a string",
            Self::Count => "a non-negative integer",
            Self::Number => "a number",
            Self::Vector => "a list of three numbers",
        }
    }

    fn accepts(self, value: &Constant) -> bool {
        match self {
            Self::Text => value.as_str().is_some(),
            Self::Count => value.as_int().is_some_and(|n| n >= 0),
            Self::Number => value.as_f64().is_some(),
            Self::Vector => value.as_vec3().is_some(),
        }
    }
}

/// One step of resolving a dynamic value.
enum Step<'g> {
    Done(Constant),
    Next(&'g Value),
}

/// `Static` memo key: the node's address. Only sound while the grammar that
/// owns the node outlives the context.
fn static_key(value: &Value) -> usize {
    std::ptr::from_ref(value) as usize
}

impl Context<'_> {
    // ══════════════════════════════════════════════════════════════════════
    // Prepare
    // ══════════════════════════════════════════════════════════════════════

    /// Validate an argument: literals must already have `shape`, dynamic
    /// values are prepared.
    pub(crate) fn prepare_arg(&mut self, op: &str, arg: &Arg, shape: Shape) -> EvalResult<()> {
        match arg {
            Arg::Constant(c) if shape.accepts(c) => Ok(()),
            Arg::Constant(c) => Err(InterpretError::structural(
                op,
                format!("expected {}, got {} {c}", shape.describe(), c.type_name()),
            )),
            Arg::Dynamic(value) => self.prepare_value(value),
        }
    }

    pub(crate) fn prepare_value(&mut self, value: &Value) -> EvalResult<()> {
        match value {
            Value::Range { min, max } => {
                let lo = min.as_int().ok_or_else(|| {
                    InterpretError::structural("range", "min_value not an integer")
                })?;
                let hi = max.as_int().ok_or_else(|| {
                    InterpretError::structural("range", "max_value not an integer")
                })?;
                if lo > hi {
                    return Err(InterpretError::structural(
                        "range",
                        "max_value is less than min_value",
                    ));
                }
                Ok(())
            }
            Value::Weighted { entries } => {
                if entries.is_empty() {
                    return Err(InterpretError::structural(
                        "weighted",
                        "weights must contain at least one (weight, value) pair",
                    ));
                }
                for entry in entries {
                    match entry.0.as_f64() {
                        Some(w) if w.is_finite() && w >= 0.0 => {}
                        _ => {
                            return Err(InterpretError::structural(
                                "weighted",
                                format!("weight {} is not a non-negative number", entry.0),
                            ))
                        }
                    }
                    if let Arg::Dynamic(inner) = &entry.1 {
                        self.prepare_value(inner)?;
                    }
                }
                Ok(())
            }
            Value::Static { of } => {
                if let Arg::Dynamic(inner) = of.as_ref() {
                    self.prepare_value(inner)?;
                }
                let resolved = self.resolve(of)?;
                self.statics.insert(static_key(value), resolved);
                Ok(())
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Evaluate
    // ══════════════════════════════════════════════════════════════════════

    fn evaluate_step<'g>(&mut self, value: &'g Value) -> EvalResult<Step<'g>> {
        match value {
            Value::Range { min, max } => {
                let lo = min.as_int().unwrap_or_default();
                let hi = max.as_int().unwrap_or(lo);
                Ok(Step::Done(Constant::Int(self.random.next_int_range(lo, hi))))
            }
            Value::Weighted { entries } => {
                let weights: Vec<f64> = entries
                    .iter()
                    .map(|e| e.0.as_f64().unwrap_or_default())
                    .collect();
                let total: f64 = weights.iter().sum();
                let threshold = total * self.random.next_uniform();
                let Some(entry) = first_reaching(&weights, threshold).map(|i| &entries[i]) else {
                    return Err(InterpretError::structural(
                        "weighted",
                        "weights must contain at least one (weight, value) pair",
                    ));
                };
                Ok(match &entry.1 {
                    Arg::Constant(c) => Step::Done(c.clone()),
                    Arg::Dynamic(next) => Step::Next(next),
                })
            }
            Value::Static { of } => {
                if let Some(cached) = self.statics.get(&static_key(value)) {
                    return Ok(Step::Done(cached.clone()));
                }
                let resolved = self.resolve(of)?;
                self.statics.insert(static_key(value), resolved.clone());
                Ok(Step::Done(resolved))
            }
        }
    }

    /// Evaluate a dynamic value until a constant is reached.
    pub(crate) fn evaluate(&mut self, value: &Value) -> EvalResult<Constant> {
        let mut current = value;
        loop {
            match self.evaluate_step(current)? {
                Step::Done(c) => return Ok(c),
                Step::Next(next) => current = next,
            }
        }
    }

    /// A literal is returned as is; a dynamic value is evaluated.
    pub(crate) fn resolve(&mut self, arg: &Arg) -> EvalResult<Constant> {
        match arg {
            Arg::Constant(c) => Ok(c.clone()),
            Arg::Dynamic(value) => self.evaluate(value),
        }
    }

    // ── Typed resolution ─────────────────────────────────────────────────

    fn resolve_shaped(&mut self, op: &str, arg: &Arg, shape: Shape) -> EvalResult<Constant> {
        let value = self.resolve(arg)?;
        if shape.accepts(&value) {
            Ok(value)
        } else {
            Err(InterpretError::argument_type(
                op,
                shape.describe(),
                format!("{} {value}", value.type_name()),
            ))
        }
    }

    pub(crate) fn resolve_text(&mut self, op: &str, arg: &Arg) -> EvalResult<String> {
        match self.resolve_shaped(op, arg, Shape::Text)? {
            Constant::Str(s) => Ok(s),
            other => Err(InterpretError::argument_type(op, "a string", other.type_name())),
        }
    }

    pub(crate) fn resolve_count(&mut self, op: &str, arg: &Arg) -> EvalResult<u64> {
        let value = self.resolve_shaped(op, arg, Shape::Count)?;
        value
            .as_int()
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| InterpretError::argument_type(op, Shape::Count.describe(), value.type_name()))
    }

    pub(crate) fn resolve_number(&mut self, op: &str, arg: &Arg) -> EvalResult<f64> {
        let value = self.resolve_shaped(op, arg, Shape::Number)?;
        value
            .as_f64()
            .ok_or_else(|| InterpretError::argument_type(op, Shape::Number.describe(), value.type_name()))
    }

    pub(crate) fn resolve_vector(&mut self, op: &str, arg: &Arg) -> EvalResult<Vec3> {
        let value = self.resolve_shaped(op, arg, Shape::Vector)?;
        value
            .as_vec3()
            .ok_or_else(|| InterpretError::argument_type(op, Shape::Vector.describe(), value.type_name()))
    }
}
