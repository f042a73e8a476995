//! Two-phase evaluation of grammar operations.
//!
//! `prepare_*` validates structure and registers definitions; it never
//! touches the scene. `execute_*` walks the grammar against the cursor and
//! mutates the scene through the adapter.

use crate::config::LINK_KEY;
use crate::context::Context;
use crate::value::Shape;
use regex::Regex;
use sprig_types::{Constant, EvalResult, InterpretError, Op};
use tracing::debug;

impl Context<'_> {
    // ══════════════════════════════════════════════════════════════════════
    // Prepare
    // ══════════════════════════════════════════════════════════════════════

    /// Prepare each operation in order, stopping at the first failure.
    ///
    /// `ops` must outlive the context: static values prepared here are
    /// cached against the addresses of their grammar nodes.
    pub fn prepare_sequence(&mut self, ops: &[Op]) -> EvalResult<()> {
        ops.iter().try_for_each(|op| self.prepare_op(op))
    }

    /// Prepare one operation. The same lifetime rule as
    /// [`Context::prepare_sequence`] applies to `op`.
    pub fn prepare_op(&mut self, op: &Op) -> EvalResult<()> {
        let name = op.name();
        match op {
            Op::Define { name: def, body } => {
                if def.is_empty() {
                    return Err(InterpretError::structural(
                        name,
                        "name of definition must be a non-empty string",
                    ));
                }
                self.prepare_sequence(body)?;
                self.set_definition(def, body.clone());
                Ok(())
            }
            Op::ExportLink { alias } => self.prepare_arg(name, alias, Shape::Text),
            Op::Scope { body } => self.prepare_sequence(body),
            Op::Repeat { count, body } => {
                self.prepare_arg(name, count, Shape::Count)?;
                self.prepare_sequence(body)
            }
            Op::Instance { name: arg }
            | Op::CreateLink { name: arg }
            | Op::MoveToLink { name: arg } => self.prepare_arg(name, arg, Shape::Text),
            Op::CopyParentLinkChildren { link, .. } => self.prepare_arg(name, link, Shape::Text),
            Op::EachLink { pattern, body } => {
                self.link_pattern(pattern)?;
                self.prepare_sequence(body)
            }
            Op::Maybe { ratio, body } => {
                self.prepare_arg(name, ratio, Shape::Number)?;
                self.prepare_sequence(body)
            }
            Op::Move { vector, .. } | Op::Scale { vector, .. } => {
                self.prepare_arg(name, vector, Shape::Vector)
            }
            Op::Rotate { euler, .. } => self.prepare_arg(name, euler, Shape::Vector),
        }
    }

    /// Compiled pattern for `EachLink`; matches are anchored at the start
    /// of the link name.
    pub(crate) fn link_pattern(&mut self, pattern: &str) -> EvalResult<Regex> {
        if let Some(compiled) = self.patterns.get(pattern) {
            return Ok(compiled.clone());
        }
        let compiled = Regex::new(&format!("^(?:{pattern})")).map_err(|e| {
            InterpretError::structural("each_link", format!("invalid pattern {pattern:?}: {e}"))
        })?;
        self.patterns.insert(pattern.to_string(), compiled.clone());
        Ok(compiled)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Execute
    // ══════════════════════════════════════════════════════════════════════

    /// Execute each operation in order.
    ///
    /// Precondition failures are recorded and the next sibling runs; any
    /// other error is returned and ends the run. `ops` should be the same
    /// grammar, at the same address, that was prepared.
    pub fn execute_sequence(&mut self, ops: &[Op]) -> EvalResult<()> {
        for op in ops {
            if let Err(error) = self.execute_op(op) {
                if error.is_fatal() {
                    return Err(error);
                }
                self.record_error(error);
            }
        }
        Ok(())
    }

    pub fn execute_op(&mut self, op: &Op) -> EvalResult<()> {
        let name = op.name();
        match op {
            Op::Define { name: def, body } => {
                self.set_definition(def, body.clone());
                Ok(())
            }
            Op::ExportLink { alias } => {
                let link = self.require_link(name)?.node;
                let alias = self.resolve_text(name, alias)?;
                debug!(%alias, %link, "export link");
                self.export_link(alias, link);
                Ok(())
            }
            Op::Scope { body } => self.with_scope(|ctx| ctx.execute_sequence(body)),
            Op::Repeat { count, body } => {
                let count = self.resolve_count(name, count)?;
                self.with_scope(|ctx| {
                    for _ in 0..count {
                        ctx.execute_sequence(body)?;
                    }
                    Ok(())
                })
            }
            Op::Instance { name: arg } => {
                self.require_link(name)?;
                let target = self.resolve_text(name, arg)?;
                self.create_instance(&target)
            }
            Op::CopyParentLinkChildren { link, mirror } => {
                self.require_link(name)?;
                let source = self.resolve_text(name, link)?;
                self.copy_parent_link_children(&source, *mirror)
            }
            Op::CreateLink { name: arg } => {
                let object = self.require_object(name)?;
                let link_name = self.resolve_text(name, arg)?;
                let world = self.scene.world_transform(object)?;
                let marker = self.scene.create_marker_node(world, object)?;
                let key = self.config.property_key(LINK_KEY);
                self.scene
                    .set_property(marker, &key, Constant::Str(link_name.clone()))?;
                debug!(%object, %marker, link = %link_name, "created link");
                Ok(())
            }
            Op::MoveToLink { name: arg } => {
                let target = self.resolve_text(name, arg)?;
                match self.find_link(&target) {
                    Some(link) => self.enter_link(link),
                    None => {
                        debug!(link = %target, "link not found");
                        Ok(())
                    }
                }
            }
            Op::EachLink { pattern, body } => {
                self.require_object(name)?;
                let pattern = self.link_pattern(pattern)?;
                let links = self.matching_links(&pattern);
                debug!(%pattern, matches = links.len(), "each link");
                for link in links {
                    self.with_scope(|ctx| {
                        ctx.enter_link(link)?;
                        ctx.execute_sequence(body)
                    })?;
                }
                Ok(())
            }
            Op::Maybe { ratio, body } => {
                let ratio = self.resolve_number(name, ratio)?;
                let sample = self.random.next_uniform();
                if sample <= ratio {
                    self.with_scope(|ctx| ctx.execute_sequence(body))
                } else {
                    debug!(sample, ratio, "maybe skipped");
                    Ok(())
                }
            }
            Op::Move { vector, absolute } => {
                self.require_link(name)?;
                let v = self.resolve_vector(name, vector)?;
                self.require_link_mut(name)?.local.translate(v, *absolute);
                Ok(())
            }
            Op::Rotate { euler, absolute } => {
                self.require_link(name)?;
                let v = self.resolve_vector(name, euler)?;
                self.require_link_mut(name)?.local.rotate(v, *absolute);
                Ok(())
            }
            Op::Scale { vector, absolute } => {
                self.require_link(name)?;
                let v = self.resolve_vector(name, vector)?;
                self.require_link_mut(name)?.local.rescale(v, *absolute);
                Ok(())
            }
        }
    }
}
