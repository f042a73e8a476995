//! Scene-graph adapter boundary.
//!
//! The interpreter never touches host scene storage directly; every query
//! and mutation goes through [`SceneGraph`]. [`MemoryScene`] is a complete
//! in-memory implementation used by the test suite and by hosts that want
//! to generate into a plain data structure.

use sprig_types::{Constant, Mat4, NodeId, SceneError};
use std::collections::BTreeMap;

/// Capabilities the interpreter needs from a host scene graph.
pub trait SceneGraph {
    /// Display name of a node, for diagnostics.
    fn name(&self, node: NodeId) -> Option<String>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Direct children in a stable order.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    fn property(&self, node: NodeId, key: &str) -> Option<Constant>;

    fn set_property(&mut self, node: NodeId, key: &str, value: Constant) -> Result<(), SceneError>;

    fn world_transform(&self, node: NodeId) -> Result<Mat4, SceneError>;

    fn set_world_transform(&mut self, node: NodeId, world: Mat4) -> Result<(), SceneError>;

    /// Deep copy of `node` and its descendants; returns the copy's root.
    fn duplicate_subtree(&mut self, node: NodeId) -> Result<NodeId, SceneError>;

    /// Move `node` under `parent`, keeping its world transform.
    fn reparent(&mut self, node: NodeId, parent: NodeId) -> Result<(), SceneError>;

    /// Spatial container (collection) the node belongs to.
    fn container_of(&self, node: NodeId) -> Option<String>;

    /// Unlink a single node from `from` and link it into `to`.
    fn move_to_container(
        &mut self,
        node: NodeId,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<(), SceneError>;

    fn flip_normals(&mut self, node: NodeId) -> Result<(), SceneError>;

    /// Bake the node's scale into its geometry.
    fn apply_scale(&mut self, node: NodeId) -> Result<(), SceneError>;

    /// Create an empty marker node at `world`, parented under `parent`.
    fn create_marker_node(&mut self, world: Mat4, parent: NodeId) -> Result<NodeId, SceneError>;

    /// Parentless members of a template collection, or `None` if no
    /// collection has that name.
    fn top_level_members(&self, collection: &str) -> Option<Vec<NodeId>>;

    /// Delete `node` and all of its descendants.
    fn remove_subtree(&mut self, node: NodeId) -> Result<(), SceneError>;
}

/// Move a whole hierarchy from one container to another.
pub fn move_hierarchy(
    scene: &mut dyn SceneGraph,
    node: NodeId,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<(), SceneError> {
    scene.move_to_container(node, from, to)?;
    for child in scene.children(node) {
        move_hierarchy(scene, child, from, to)?;
    }
    Ok(())
}

/// All descendants of `node` in depth-first pre-order, excluding `node`.
pub fn descendants(scene: &dyn SceneGraph, node: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = scene.children(node).into_iter().rev().collect();
    while let Some(next) = stack.pop() {
        out.push(next);
        stack.extend(scene.children(next).into_iter().rev());
    }
    out
}

// ══════════════════════════════════════════════════════════════════════════════
// MemoryScene
// ══════════════════════════════════════════════════════════════════════════════

/// One node of a [`MemoryScene`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryNode {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub properties: BTreeMap<String, Constant>,
    /// Transform relative to the parent (or world, when parentless).
    pub local: Mat4,
    pub container: Option<String>,
    /// Node this one was duplicated from.
    pub source: Option<NodeId>,
    pub normals_flipped: bool,
    pub scale_applied: bool,
}

impl MemoryNode {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            children: Vec::new(),
            properties: BTreeMap::new(),
            local: Mat4::IDENTITY,
            container: None,
            source: None,
            normals_flipped: false,
            scale_applied: false,
        }
    }
}

/// An in-memory scene graph.
///
/// Nodes store parent-relative transforms, so moving a parent carries its
/// children along. There is no geometry: normal flips and scale bakes are
/// recorded as flags.
#[derive(Debug, Clone, Default)]
pub struct MemoryScene {
    nodes: BTreeMap<NodeId, MemoryNode>,
    collections: Vec<String>,
    next_id: u64,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a template collection (container).
    pub fn add_collection(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.collections.contains(&name) {
            self.collections.push(name);
        }
    }

    /// Add a node; it joins its parent's container.
    pub fn add_node(&mut self, name: impl Into<String>, parent: Option<NodeId>) -> NodeId {
        let id = self.alloc();
        let mut node = MemoryNode::new(name);
        if let Some(p) = parent {
            node.parent = Some(p);
            node.container = self.nodes.get(&p).and_then(|n| n.container.clone());
            if let Some(pn) = self.nodes.get_mut(&p) {
                pn.children.push(id);
            }
        }
        self.nodes.insert(id, node);
        id
    }

    /// Add a parentless node into a collection, declaring it if needed.
    pub fn add_template(&mut self, collection: &str, name: impl Into<String>) -> NodeId {
        self.add_collection(collection);
        let id = self.add_node(name, None);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.container = Some(collection.to_string());
        }
        id
    }

    /// Set a property, returning the node for chaining in fixtures.
    pub fn tag(&mut self, node: NodeId, key: &str, value: impl Into<Constant>) -> NodeId {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.properties.insert(key.to_string(), value.into());
        }
        node
    }

    pub fn set_local(&mut self, node: NodeId, local: Mat4) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.local = local;
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&MemoryNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids of all nodes whose name equals `name`.
    pub fn find_by_name(&self, name: &str) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.name == name)
            .map(|(id, _)| *id)
            .collect()
    }

    fn alloc(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId(self.next_id)
    }

    fn get(&self, id: NodeId) -> Result<&MemoryNode, SceneError> {
        self.nodes.get(&id).ok_or(SceneError::UnknownNode(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut MemoryNode, SceneError> {
        self.nodes.get_mut(&id).ok_or(SceneError::UnknownNode(id))
    }

    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    fn copy_under(&mut self, source: NodeId, parent: Option<NodeId>) -> Result<NodeId, SceneError> {
        let template = self.get(source)?.clone();
        let id = self.alloc();
        let mut copy = template.clone();
        copy.parent = parent;
        copy.children = Vec::new();
        copy.source = Some(source);
        self.nodes.insert(id, copy);
        for child in template.children {
            let child_copy = self.copy_under(child, Some(id))?;
            self.get_mut(id)?.children.push(child_copy);
        }
        Ok(id)
    }

    fn parent_world(&self, node: &MemoryNode) -> Result<Mat4, SceneError> {
        match node.parent {
            Some(p) => self.world_transform(p),
            None => Ok(Mat4::IDENTITY),
        }
    }
}

impl SceneGraph for MemoryScene {
    fn name(&self, node: NodeId) -> Option<String> {
        self.nodes.get(&node).map(|n| n.name.clone())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn property(&self, node: NodeId, key: &str) -> Option<Constant> {
        self.nodes.get(&node)?.properties.get(key).cloned()
    }

    fn set_property(&mut self, node: NodeId, key: &str, value: Constant) -> Result<(), SceneError> {
        self.get_mut(node)?.properties.insert(key.to_string(), value);
        Ok(())
    }

    fn world_transform(&self, node: NodeId) -> Result<Mat4, SceneError> {
        let n = self.get(node)?;
        Ok(self.parent_world(n)? * n.local)
    }

    fn set_world_transform(&mut self, node: NodeId, world: Mat4) -> Result<(), SceneError> {
        let parent_world = self.parent_world(self.get(node)?)?;
        let local = match parent_world.inverse_affine() {
            Some(inv) => inv * world,
            None => {
                return Err(SceneError::Host(format!(
                    "parent of {node} has a singular transform"
                )))
            }
        };
        self.get_mut(node)?.local = local;
        Ok(())
    }

    fn duplicate_subtree(&mut self, node: NodeId) -> Result<NodeId, SceneError> {
        let parent = self.get(node)?.parent;
        let copy = self.copy_under(node, parent)?;
        if let Some(p) = parent {
            self.get_mut(p)?.children.push(copy);
        }
        Ok(copy)
    }

    fn reparent(&mut self, node: NodeId, parent: NodeId) -> Result<(), SceneError> {
        self.get(parent)?;
        if self.is_ancestor(node, parent) {
            return Err(SceneError::Cycle {
                child: node,
                parent,
            });
        }
        let world = self.world_transform(node)?;
        if let Some(old) = self.get(node)?.parent {
            self.get_mut(old)?.children.retain(|c| *c != node);
        }
        self.get_mut(node)?.parent = Some(parent);
        self.get_mut(parent)?.children.push(node);
        self.set_world_transform(node, world)
    }

    fn container_of(&self, node: NodeId) -> Option<String> {
        self.nodes.get(&node)?.container.clone()
    }

    fn move_to_container(
        &mut self,
        node: NodeId,
        _from: Option<&str>,
        to: Option<&str>,
    ) -> Result<(), SceneError> {
        self.get_mut(node)?.container = to.map(str::to_string);
        Ok(())
    }

    fn flip_normals(&mut self, node: NodeId) -> Result<(), SceneError> {
        let n = self.get_mut(node)?;
        n.normals_flipped = !n.normals_flipped;
        Ok(())
    }

    fn apply_scale(&mut self, node: NodeId) -> Result<(), SceneError> {
        self.get_mut(node)?.scale_applied = true;
        Ok(())
    }

    fn create_marker_node(&mut self, world: Mat4, parent: NodeId) -> Result<NodeId, SceneError> {
        self.get(parent)?;
        let id = self.add_node("link", Some(parent));
        self.set_world_transform(id, world)?;
        Ok(id)
    }

    fn top_level_members(&self, collection: &str) -> Option<Vec<NodeId>> {
        if !self.collections.iter().any(|c| c == collection) {
            return None;
        }
        Some(
            self.nodes
                .iter()
                .filter(|(_, n)| n.parent.is_none() && n.container.as_deref() == Some(collection))
                .map(|(id, _)| *id)
                .collect(),
        )
    }

    fn remove_subtree(&mut self, node: NodeId) -> Result<(), SceneError> {
        if let Some(parent) = self.get(node)?.parent {
            self.get_mut(parent)?.children.retain(|c| *c != node);
        }
        let mut doomed = descendants(&*self, node);
        doomed.push(node);
        for id in doomed {
            self.nodes.remove(&id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprig_types::Vec3;

    const EPS: f64 = 1e-9;

    #[test]
    fn children_follow_parent_transform() {
        let mut scene = MemoryScene::new();
        let root = scene.add_node("root", None);
        let child = scene.add_node("child", Some(root));
        scene.set_local(child, Mat4::translation(Vec3::new(0.0, 1.0, 0.0)));
        scene
            .set_world_transform(root, Mat4::translation(Vec3::new(5.0, 0.0, 0.0)))
            .unwrap();
        let w = scene.world_transform(child).unwrap().translation_part();
        assert!(w.approx_eq(Vec3::new(5.0, 1.0, 0.0), EPS));
    }

    #[test]
    fn duplicate_copies_whole_subtree() {
        let mut scene = MemoryScene::new();
        let tpl = scene.add_template("walls", "wall");
        let part = scene.add_node("window", Some(tpl));
        scene.tag(part, "gen_link", "win");

        let copy = scene.duplicate_subtree(tpl).unwrap();
        assert_ne!(copy, tpl);
        let copied_children = scene.children(copy);
        assert_eq!(copied_children.len(), 1);
        assert_eq!(
            scene.property(copied_children[0], "gen_link"),
            Some(Constant::from("win"))
        );
        assert_eq!(scene.node(copy).unwrap().source, Some(tpl));
        // Template collection membership is unchanged by copying.
        assert_eq!(scene.top_level_members("walls").unwrap().len(), 2);
    }

    #[test]
    fn reparent_keeps_world_and_rejects_cycles() {
        let mut scene = MemoryScene::new();
        let a = scene.add_node("a", None);
        let b = scene.add_node("b", Some(a));
        let c = scene.add_node("c", None);
        scene
            .set_world_transform(a, Mat4::translation(Vec3::new(1.0, 0.0, 0.0)))
            .unwrap();
        scene
            .set_world_transform(c, Mat4::translation(Vec3::new(0.0, 0.0, 3.0)))
            .unwrap();

        scene.reparent(c, b).unwrap();
        assert_eq!(scene.parent(c), Some(b));
        let w = scene.world_transform(c).unwrap().translation_part();
        assert!(w.approx_eq(Vec3::new(0.0, 0.0, 3.0), EPS));

        assert_eq!(
            scene.reparent(a, c),
            Err(SceneError::Cycle { child: a, parent: c })
        );
    }

    #[test]
    fn unknown_collection_is_none() {
        let scene = MemoryScene::new();
        assert_eq!(scene.top_level_members("nope"), None);
    }

    #[test]
    fn remove_subtree_drops_descendants() {
        let mut scene = MemoryScene::new();
        let root = scene.add_node("root", None);
        let a = scene.add_node("a", Some(root));
        scene.add_node("b", Some(a));
        scene.remove_subtree(a).unwrap();
        assert_eq!(scene.len(), 1);
        assert!(scene.children(root).is_empty());
    }

    #[test]
    fn move_hierarchy_relinks_descendants() {
        let mut scene = MemoryScene::new();
        let tpl = scene.add_template("lib", "t");
        let kid = scene.add_node("k", Some(tpl));
        move_hierarchy(&mut scene, tpl, Some("lib"), Some("out")).unwrap();
        assert_eq!(scene.container_of(tpl).as_deref(), Some("out"));
        assert_eq!(scene.container_of(kid).as_deref(), Some("out"));
    }
}
