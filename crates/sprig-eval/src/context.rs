//! Interpretation context: all mutable state of one generation run.
//!
//! The context owns the cursor, the scope and capture stacks, the
//! definitions table, and the run's output (generated nodes and errors). It
//! borrows the scene adapter and the random source for the duration of the
//! run and is dropped afterwards; nothing here outlives a single run.

use crate::config::{InterpretConfig, LINK_KEY};
use crate::random::RandomSource;
use crate::scene::SceneGraph;
use regex::Regex;
use sprig_types::{
    Constant, CursorKind, EvalResult, InterpretError, LocalTransform, Mat4, NodeId, Sequence,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

// ══════════════════════════════════════════════════════════════════════════════
// Cursor
// ══════════════════════════════════════════════════════════════════════════════

/// A link the cursor sits on, with the offset accumulated since arriving.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkCursor {
    pub node: NodeId,
    /// World matrix of the link when it became current.
    pub world: Mat4,
    pub local: LocalTransform,
}

impl LinkCursor {
    /// `world * T * R * S`.
    pub fn composed(&self) -> Mat4 {
        self.world * self.local.matrix()
    }
}

/// Links exported by a definition, in export order.
///
/// Re-exporting an alias rebinds it in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkAliases(Vec<(String, NodeId)>);

impl LinkAliases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alias: String, link: NodeId) {
        match self.0.iter_mut().find(|(name, _)| *name == alias) {
            Some(entry) => entry.1 = link,
            None => self.0.push((alias, link)),
        }
    }

    pub fn get(&self, alias: &str) -> Option<NodeId> {
        self.0
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(_, link)| *link)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.0.iter().map(|(name, link)| (name.as_str(), *link))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The interpreter's single current position.
#[derive(Debug, Clone, PartialEq)]
pub enum Cursor {
    /// A freshly instanced object.
    Object(NodeId),
    /// An object produced by a definition; links resolve through `aliases` only.
    ObjectWithAliases {
        object: NodeId,
        aliases: LinkAliases,
    },
    Link(LinkCursor),
}

impl Cursor {
    pub fn kind(&self) -> CursorKind {
        match self {
            Self::Object(_) => CursorKind::Object,
            Self::ObjectWithAliases { .. } => CursorKind::ObjectWithAliases,
            Self::Link(_) => CursorKind::Link,
        }
    }

    /// The current object, aliased or not.
    pub fn object(&self) -> Option<NodeId> {
        match self {
            Self::Object(id) | Self::ObjectWithAliases { object: id, .. } => Some(*id),
            Self::Link(_) => None,
        }
    }

    pub fn link(&self) -> Option<&LinkCursor> {
        match self {
            Self::Link(link) => Some(link),
            _ => None,
        }
    }
}

/// An in-progress definition expansion.
#[derive(Debug, Clone)]
pub(crate) struct CaptureFrame {
    /// Cursor when the definition started; restored if nothing is captured.
    pub(crate) entry: Cursor,
    /// First object instanced while this frame was active.
    pub(crate) object: Option<NodeId>,
    pub(crate) aliases: LinkAliases,
}

// ══════════════════════════════════════════════════════════════════════════════
// Context
// ══════════════════════════════════════════════════════════════════════════════

/// Mutable interpreter state for one run.
pub struct Context<'a> {
    pub(crate) scene: &'a mut dyn SceneGraph,
    pub(crate) random: &'a mut dyn RandomSource,
    pub(crate) config: &'a InterpretConfig,
    cursor: Cursor,
    scopes: Vec<Cursor>,
    definitions: HashMap<String, Sequence>,
    captures: Vec<CaptureFrame>,
    /// Memoized `Static` values, keyed by node address in the grammar.
    pub(crate) statics: HashMap<usize, Constant>,
    /// Compiled `EachLink` patterns.
    pub(crate) patterns: HashMap<String, Regex>,
    /// Sequences parsed from leaf directives, held so their addresses stay
    /// unique for the static cache.
    pub(crate) retained: Vec<Sequence>,
    pub(crate) expanded_leaves: HashSet<NodeId>,
    pub(crate) depth: usize,
    generated: Vec<NodeId>,
    errors: Vec<InterpretError>,
}

impl<'a> Context<'a> {
    /// Create a context whose cursor sits on `start_link`.
    pub fn new(
        scene: &'a mut dyn SceneGraph,
        random: &'a mut dyn RandomSource,
        config: &'a InterpretConfig,
        start_link: NodeId,
    ) -> EvalResult<Self> {
        let world = scene.world_transform(start_link)?;
        Ok(Self {
            scene,
            random,
            config,
            cursor: Cursor::Link(LinkCursor {
                node: start_link,
                world,
                local: LocalTransform::IDENTITY,
            }),
            scopes: Vec::new(),
            definitions: HashMap::new(),
            captures: Vec::new(),
            statics: HashMap::new(),
            patterns: HashMap::new(),
            retained: Vec::new(),
            expanded_leaves: HashSet::new(),
            depth: 0,
            generated: Vec::new(),
            errors: Vec::new(),
        })
    }

    // ── Cursor ───────────────────────────────────────────────────────────

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn set_object(&mut self, object: NodeId) {
        debug!(%object, "cursor -> object");
        self.cursor = Cursor::Object(object);
    }

    pub fn set_object_with_aliases(&mut self, object: NodeId, aliases: LinkAliases) {
        debug!(%object, aliases = aliases.len(), "cursor -> aliased object");
        self.cursor = Cursor::ObjectWithAliases { object, aliases };
    }

    /// Move onto a link, capturing its world matrix and resetting the offset.
    pub fn enter_link(&mut self, node: NodeId) -> EvalResult<()> {
        let world = self.scene.world_transform(node)?;
        debug!(link = %node, "cursor -> link");
        self.cursor = Cursor::Link(LinkCursor {
            node,
            world,
            local: LocalTransform::IDENTITY,
        });
        Ok(())
    }

    /// The link cursor, or a precondition error naming `op`.
    pub(crate) fn require_link(&self, op: &str) -> EvalResult<&LinkCursor> {
        self.cursor
            .link()
            .ok_or_else(|| InterpretError::precondition(op, CursorKind::Link, self.cursor.kind()))
    }

    pub(crate) fn require_link_mut(&mut self, op: &str) -> EvalResult<&mut LinkCursor> {
        let found = self.cursor.kind();
        match &mut self.cursor {
            Cursor::Link(link) => Ok(link),
            _ => Err(InterpretError::precondition(op, CursorKind::Link, found)),
        }
    }

    /// The current object (aliased or not), or a precondition error.
    pub(crate) fn require_object(&self, op: &str) -> EvalResult<NodeId> {
        self.cursor
            .object()
            .ok_or_else(|| InterpretError::precondition(op, CursorKind::Object, self.cursor.kind()))
    }

    // ── Scopes ───────────────────────────────────────────────────────────

    pub fn push_scope(&mut self) {
        self.scopes.push(self.cursor.clone());
        debug!(depth = self.scopes.len(), "push scope");
    }

    pub fn pop_scope(&mut self) {
        match self.scopes.pop() {
            Some(saved) => {
                self.cursor = saved;
                debug!(depth = self.scopes.len(), "pop scope");
            }
            None => warn!("pop_scope on empty scope stack"),
        }
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Run `f` inside a scope; the cursor is restored whatever `f` returns.
    pub(crate) fn with_scope<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> EvalResult<T>,
    ) -> EvalResult<T> {
        self.push_scope();
        let result = f(self);
        self.pop_scope();
        result
    }

    // ── Definitions ──────────────────────────────────────────────────────

    pub fn set_definition(&mut self, name: &str, body: Sequence) {
        self.definitions.insert(name.to_string(), body);
    }

    pub fn definition(&self, name: &str) -> Option<Sequence> {
        self.definitions.get(name).cloned()
    }

    // ── Export captures ──────────────────────────────────────────────────

    pub(crate) fn push_capture(&mut self) {
        self.captures.push(CaptureFrame {
            entry: self.cursor.clone(),
            object: None,
            aliases: LinkAliases::new(),
        });
        debug!(depth = self.captures.len(), "push export capture");
    }

    /// Close the innermost capture frame.
    ///
    /// The cursor becomes the captured object with its aliases; with no
    /// captured object the cursor returns to where the frame started.
    pub(crate) fn pop_capture(&mut self) {
        let Some(frame) = self.captures.pop() else {
            warn!("pop_capture on empty capture stack");
            return;
        };
        match frame.object {
            Some(object) => self.set_object_with_aliases(object, frame.aliases),
            None => {
                debug!("export capture discarded: no object instanced");
                self.cursor = frame.entry;
            }
        }
    }

    /// Publish `link` under `alias` in the innermost capture frame.
    pub(crate) fn export_link(&mut self, alias: String, link: NodeId) {
        match self.captures.last_mut() {
            Some(frame) => {
                frame.aliases.insert(alias, link);
            }
            None => debug!(%alias, "export_link outside a definition"),
        }
    }

    // ── Output ───────────────────────────────────────────────────────────

    /// Record a node created by duplication.
    pub(crate) fn add_generated(&mut self, node: NodeId) {
        self.generated.push(node);
    }

    /// Record an instanced object and offer it to every open capture frame.
    pub(crate) fn add_instanced(&mut self, node: NodeId) {
        self.add_generated(node);
        for frame in self.captures.iter_mut().filter(|f| f.object.is_none()) {
            frame.object = Some(node);
        }
    }

    pub fn generated(&self) -> &[NodeId] {
        &self.generated
    }

    pub fn errors(&self) -> &[InterpretError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Collect an error. Precondition errors are dropped with a warning when
    /// strict mode is off.
    pub fn record_error(&mut self, error: InterpretError) {
        if !self.config.strict && !error.is_fatal() {
            warn!(%error, "skipping operation");
            return;
        }
        debug!(%error, "error recorded");
        self.errors.push(error);
    }

    pub fn into_output(self) -> (Vec<NodeId>, Vec<InterpretError>) {
        (self.generated, self.errors)
    }

    // ── Properties & links ───────────────────────────────────────────────

    /// Read a prefixed custom property.
    pub fn property(&self, node: NodeId, key: &str) -> Option<Constant> {
        self.scene.property(node, &self.config.property_key(key))
    }

    /// The link name a node is tagged with, if any.
    pub fn link_name(&self, node: NodeId) -> Option<String> {
        match self.property(node, LINK_KEY)? {
            Constant::Str(name) => Some(name),
            _ => None,
        }
    }

    /// Link-tagged nodes below `root` that satisfy `accept`.
    ///
    /// The search never descends into a link-tagged node, so a link only
    /// sees links up to the next link boundary.
    fn bounded_links(&self, root: NodeId, accept: &dyn Fn(&str) -> bool) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.scene.children(root).into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            match self.link_name(node) {
                Some(name) => {
                    if accept(&name) {
                        found.push(node);
                    }
                }
                None => stack.extend(self.scene.children(node).into_iter().rev()),
            }
        }
        found
    }

    /// Resolve a link by exact name from the current cursor.
    pub fn find_link(&self, name: &str) -> Option<NodeId> {
        match &self.cursor {
            Cursor::ObjectWithAliases { aliases, .. } => aliases.get(name),
            Cursor::Object(object) => self.bounded_links(*object, &|n| n == name).first().copied(),
            Cursor::Link(link) => self.bounded_links(link.node, &|n| n == name).first().copied(),
        }
    }

    /// Every visible link whose name matches `pattern`, in discovery order.
    pub fn matching_links(&self, pattern: &Regex) -> Vec<NodeId> {
        match &self.cursor {
            Cursor::ObjectWithAliases { aliases, .. } => aliases
                .iter()
                .filter(|(alias, _)| pattern.is_match(alias))
                .map(|(_, node)| node)
                .collect(),
            Cursor::Object(object) => self.bounded_links(*object, &|n| pattern.is_match(n)),
            Cursor::Link(link) => self.bounded_links(link.node, &|n| pattern.is_match(n)),
        }
    }
}
