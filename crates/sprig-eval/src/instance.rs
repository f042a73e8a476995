//! Instancing: definitions, weighted template selection, leaf instancers,
//! and copying of sibling-link children.

use crate::config::{INSTANCE_KEY, WEIGHT_KEY};
use crate::context::Context;
use crate::interpreter::parse_sequence;
use crate::scene::{descendants, move_hierarchy};
use crate::selection::first_exceeding;
use sprig_types::{Axis, Constant, EvalResult, Mat4, NodeId};
use tracing::{debug, warn};

impl Context<'_> {
    // ══════════════════════════════════════════════════════════════════════
    // create-instance
    // ══════════════════════════════════════════════════════════════════════

    /// Instantiate `name` at the current link.
    ///
    /// A registered definition wins over a template collection of the same
    /// name. Unknown names, empty collections and requests nested deeper
    /// than `max_depth` are silent misses.
    pub fn create_instance(&mut self, name: &str) -> EvalResult<()> {
        if self.depth > self.config.max_depth {
            debug!(%name, depth = self.depth, "instance depth limit reached");
            return Ok(());
        }
        self.depth += 1;
        let result = self.instance_at_depth(name);
        self.depth -= 1;
        result
    }

    fn instance_at_depth(&mut self, name: &str) -> EvalResult<()> {
        if let Some(body) = self.definition(name) {
            debug!(%name, "instance definition");
            self.push_capture();
            let result = self.execute_sequence(&body);
            self.pop_capture();
            result?;
        } else if let Some(members) = self.scene.top_level_members(name) {
            self.instance_template(name, &members)?;
        } else {
            debug!(%name, "no definition or template collection");
            return Ok(());
        }

        match self.cursor().object() {
            Some(object) => self.expand_leaf_instancers(object),
            None => Ok(()),
        }
    }

    /// Weight of a template candidate. Missing or non-numeric weights count
    /// as 1, negative ones as 0.
    fn template_weight(&self, node: NodeId) -> f64 {
        match self.property(node, WEIGHT_KEY).and_then(|w| w.as_f64()) {
            Some(w) if w.is_finite() => w.max(0.0),
            _ => 1.0,
        }
    }

    fn instance_template(&mut self, collection: &str, members: &[NodeId]) -> EvalResult<()> {
        let link = self.require_link("instance")?.clone();
        let weights: Vec<f64> = members.iter().map(|m| self.template_weight(*m)).collect();
        let total: f64 = weights.iter().sum();
        let threshold = self.random.next_uniform() * total;
        let Some(template) = first_exceeding(&weights, threshold).map(|i| members[i]) else {
            debug!(%collection, "template collection is empty");
            return Ok(());
        };

        let copy = self.scene.duplicate_subtree(template)?;
        self.scene.set_world_transform(copy, link.composed())?;
        self.adopt(copy, link.node)?;
        debug!(%collection, %template, %copy, "instanced template");

        self.set_object(copy);
        self.add_instanced(copy);
        Ok(())
    }

    /// Move a fresh copy into `link`'s container and parent it under `link`.
    fn adopt(&mut self, node: NodeId, link: NodeId) -> EvalResult<()> {
        let from = self.scene.container_of(node);
        let to = self.scene.container_of(link);
        move_hierarchy(&mut *self.scene, node, from.as_deref(), to.as_deref())?;
        self.scene.reparent(node, link)?;
        Ok(())
    }

    // ── Leaf instancers ──────────────────────────────────────────────────

    /// Run the directive of every childless descendant of `object` that
    /// carries one. Each leaf runs at most once per context.
    fn expand_leaf_instancers(&mut self, object: NodeId) -> EvalResult<()> {
        let key = self.config.property_key(INSTANCE_KEY);
        let leaves: Vec<(NodeId, String)> = descendants(&*self.scene, object)
            .into_iter()
            .filter(|n| self.scene.children(*n).is_empty())
            .filter_map(|n| match self.scene.property(n, &key) {
                Some(Constant::Str(directive)) => Some((n, directive)),
                _ => None,
            })
            .collect();

        for (leaf, directive) in leaves {
            if !self.expanded_leaves.insert(leaf) {
                continue;
            }
            debug!(%leaf, %directive, "leaf instancer");
            self.with_scope(|ctx| {
                ctx.enter_link(leaf)?;
                ctx.run_directive(leaf, &directive)
            })?;
        }
        Ok(())
    }

    /// A directive is either a JSON operation sequence or an instance name.
    fn run_directive(&mut self, leaf: NodeId, directive: &str) -> EvalResult<()> {
        let Ok(sequence) = parse_sequence(directive) else {
            return self.create_instance(directive.trim());
        };
        self.retained.push(sequence.clone());
        if let Err(error) = self.prepare_sequence(&sequence) {
            warn!(%leaf, %error, "leaf directive rejected");
            self.record_error(error);
            return Ok(());
        }
        self.execute_sequence(&sequence)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Sibling-link copies
    // ══════════════════════════════════════════════════════════════════════

    /// Duplicate the children of the sibling link named `source` under the
    /// current link, optionally mirrored across `mirror`.
    pub(crate) fn copy_parent_link_children(
        &mut self,
        source: &str,
        mirror: Option<Axis>,
    ) -> EvalResult<()> {
        let link = self.require_link("copy_parent_link_children")?.clone();
        let Some(parent) = self.scene.parent(link.node) else {
            debug!(link = %link.node, "current link has no parent");
            return Ok(());
        };
        let sibling = self
            .scene
            .children(parent)
            .into_iter()
            .find(|n| self.link_name(*n).as_deref() == Some(source));
        let Some(sibling) = sibling else {
            debug!(%source, "sibling link not found");
            return Ok(());
        };

        let target = link.composed();
        for child in self.scene.children(sibling) {
            let copy = self.scene.duplicate_subtree(child)?;
            self.scene.set_world_transform(copy, target)?;
            self.adopt(copy, link.node)?;
            if let Some(axis) = mirror {
                self.mirror(copy, link.node, axis)?;
            }
            debug!(%source, %child, %copy, "copied sibling link child");
            self.add_generated(copy);
        }
        Ok(())
    }

    /// Reflect `node` across `axis` in the frame of `link`, bake the scale
    /// and flip normals.
    fn mirror(&mut self, node: NodeId, link: NodeId, axis: Axis) -> EvalResult<()> {
        let frame = self.scene.world_transform(link)?;
        let world = self.scene.world_transform(node)?;
        let flip = Mat4::scale(axis.mirror_scale());
        let mirrored = match frame.inverse_affine() {
            Some(inverse) => frame * flip * inverse * world,
            None => world * flip,
        };
        self.scene.set_world_transform(node, mirrored)?;
        self.scene.apply_scale(node)?;
        self.scene.flip_normals(node)?;
        Ok(())
    }
}
