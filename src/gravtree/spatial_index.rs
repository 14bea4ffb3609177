//! Mutable region quadtree that keeps bodies spatially indexed while they move.
//!
//! Nodes live in an arena and refer to each other through [`NodeId`] handles: a parent
//! owns its four children through its [`NodeKind::Internal`] array and every child keeps
//! a plain handle back to its parent. Leaves split when they overflow and four sibling
//! leaves merge back into their parent when they become sparse.
//!
//! Each node also caches the total mass and centroid of its subtree. Mutations only mark
//! the cache stale, walking up until they meet an ancestor that is already stale;
//! [`SpatialIndex::recalculate`] rebuilds whatever is stale on demand.
//!
//! # Example
//!
//! ```
//! use gravtree::gravtree::{Bodies, Rect, SpatialIndex};
//! use gravtree::utils::TreeConfig;
//!
//! let mut bodies = Bodies::new();
//! let mut index = SpatialIndex::new(Rect::new(0.0, 0.0, 2.0, 2.0), TreeConfig::default())
//!     .expect("valid config");
//!
//! let a = bodies.spawn(0.5, 0.5, 1.0).unwrap();
//! let b = bodies.spawn(1.5, 1.5, 3.0).unwrap();
//! assert!(index.insert(&mut bodies, a).unwrap());
//! assert!(index.insert(&mut bodies, b).unwrap());
//!
//! // Outside the domain: an ordinary rejection, not an error.
//! let c = bodies.spawn(5.0, 5.0, 1.0).unwrap();
//! assert!(!index.insert(&mut bodies, c).unwrap());
//!
//! let root = index.root();
//! let centroid = index.recalculate(&bodies, root).unwrap();
//! assert_eq!(centroid.m, 4.0);
//! assert!((centroid.x - 1.25).abs() < 1e-12);
//! ```
use std::collections::HashSet;

use log::{debug, trace};

use crate::gravtree::{Bodies, BodyId, Centroid, NodeId, NodeKind, PointMass, QuadNode, Rect};
use crate::utils::{PruneTrigger, TreeConfig, TreeError};

/// The quadtree root and its mutation API.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    nodes: Vec<Option<QuadNode>>,
    free: Vec<NodeId>,
    root: NodeId,
    config: TreeConfig,
    len: usize,
}

impl SpatialIndex {
    /// Creates an empty index covering `domain`.
    ///
    /// With `min_depth > 0` the first levels are split immediately so that no node
    /// shallower than `min_depth` is ever a leaf.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::InvalidConfig` if `config` fails [`TreeConfig::validate`] or
    /// `domain` is empty or not finite.
    pub fn new(domain: Rect, config: TreeConfig) -> Result<Self, TreeError> {
        config.validate()?;
        let finite = [domain.x0, domain.y0, domain.x1, domain.y1].iter().all(|v| v.is_finite());
        if !finite || domain.width() <= 0.0 || domain.height() <= 0.0 {
            return Err(TreeError::InvalidConfig(format!("empty or unbounded domain {:?}", domain)));
        }
        let mut index = SpatialIndex {
            nodes: vec![Some(QuadNode::new(domain, 0, None))],
            free: Vec::new(),
            root: NodeId(0),
            config,
            len: 0,
        };
        if config.min_depth > 0 {
            let root = index.root;
            index.split(root)?;
        }
        Ok(index)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn domain(&self) -> Rect {
        self.nodes[self.root.0].as_ref().map(|n| n.rect).unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0))
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Number of bodies currently indexed.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn node(&self, id: NodeId) -> Result<&QuadNode, TreeError> {
        self.nodes
            .get(id.0)
            .and_then(|n| n.as_ref())
            .ok_or(TreeError::StaleNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut QuadNode, TreeError> {
        self.nodes
            .get_mut(id.0)
            .and_then(|n| n.as_mut())
            .ok_or(TreeError::StaleNode(id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// All leaves, depth first in NW, NE, SW, SE order.
    pub fn leaves(&self) -> Vec<NodeId> {
        let mut leaves = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let Ok(node) = self.node(id) else { continue };
            match node.children() {
                Some(children) => stack.extend(children.iter().rev()),
                None => leaves.push(id),
            }
        }
        leaves
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves().len()
    }

    /// Depth of the deepest live node.
    pub fn max_depth_reached(&self) -> u32 {
        self.nodes.iter().flatten().map(|n| n.depth).max().unwrap_or(0)
    }

    /// The cached centroid of `id`, or `None` if it is stale.
    pub fn centroid(&self, id: NodeId) -> Result<Option<Centroid>, TreeError> {
        let node = self.node(id)?;
        Ok(node.centroid_valid.then_some(node.centroid))
    }

    fn alloc(&mut self, node: QuadNode) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    fn release(&mut self, id: NodeId) -> Option<QuadNode> {
        let node = self.nodes.get_mut(id.0)?.take();
        if node.is_some() {
            self.free.push(id);
        }
        node
    }

    // insertion ============================================================================

    /// Inserts an existing body at its current position.
    ///
    /// Returns `Ok(false)` when the position lies outside the domain; the tree is left
    /// untouched in that case.
    ///
    /// # Errors
    ///
    /// - `TreeError::UnknownBody` / `TreeError::AlreadyIndexed` for a bad caller request.
    /// - `TreeError::Redistribution` if no child accepts a contained body. This means
    ///   the midpoint arithmetic is broken and the tree must be discarded.
    pub fn insert(&mut self, bodies: &mut Bodies, id: BodyId) -> Result<bool, TreeError> {
        let body = bodies.body(id)?;
        if body.leaf.is_some() {
            return Err(TreeError::AlreadyIndexed(id));
        }
        let (x, y) = (body.x, body.y);
        let inserted = self.insert_at(bodies, self.root, id, x, y)?;
        if inserted {
            self.len += 1;
        }
        Ok(inserted)
    }

    fn insert_at(
        &mut self,
        bodies: &mut Bodies,
        node_id: NodeId,
        body: BodyId,
        x: f64,
        y: f64,
    ) -> Result<bool, TreeError> {
        if !self.node(node_id)?.rect.contains(x, y) {
            return Ok(false);
        }

        self.invalidate_centroid(node_id);

        let config = self.config;
        let node = self.node_mut(node_id)?;
        let depth = node.depth;
        if let NodeKind::Leaf(held) = &mut node.kind {
            if depth >= config.max_depth
                || (depth >= config.min_depth && held.len() < config.max_capacity)
            {
                held.push(body);
                bodies.body_mut(body)?.leaf = Some(node_id);
                return Ok(true);
            }
        }

        if self.node(node_id)?.is_leaf() {
            self.subdivide(bodies, node_id)?;
        }

        for child in self.children_of(node_id)? {
            if self.insert_at(bodies, child, body, x, y)? {
                return Ok(true);
            }
        }
        Err(TreeError::Redistribution { body, node: node_id })
    }

    fn children_of(&self, node_id: NodeId) -> Result<[NodeId; 4], TreeError> {
        self.node(node_id)?.children().ok_or_else(|| {
            TreeError::InvariantViolation(format!("expected {} to be internal", node_id))
        })
    }

    /// Turns a leaf into an internal node and pushes its bodies down into the new children.
    fn subdivide(&mut self, bodies: &mut Bodies, node_id: NodeId) -> Result<(), TreeError> {
        let (held, children) = self.split(node_id)?;
        trace!("subdividing {} ({} bodies)", node_id, held.len());

        for body in held {
            let b = bodies.body(body)?;
            let (x, y) = (b.x, b.y);
            let mut placed = false;
            for child in children {
                if self.insert_at(bodies, child, body, x, y)? {
                    placed = true;
                    break;
                }
            }
            if !placed {
                return Err(TreeError::Redistribution { body, node: node_id });
            }
        }
        Ok(())
    }

    /// Allocates four children, makes `node_id` internal and hands back the bodies it held.
    /// Children shallower than `min_depth` are split right away.
    fn split(&mut self, node_id: NodeId) -> Result<(Vec<BodyId>, [NodeId; 4]), TreeError> {
        let node = self.node(node_id)?;
        let (rect, depth) = (node.rect, node.depth);

        let children = rect
            .subdivide()
            .map(|r| self.alloc(QuadNode::new(r, depth + 1, Some(node_id))));

        let previous = std::mem::replace(&mut self.node_mut(node_id)?.kind, NodeKind::Internal(children));
        let held = match previous {
            NodeKind::Leaf(held) => held,
            NodeKind::Internal(_) => {
                return Err(TreeError::InvariantViolation(format!("{} split twice", node_id)));
            }
        };

        if depth + 1 < self.config.min_depth {
            for child in children {
                self.split(child)?;
            }
        }
        Ok((held, children))
    }

    // removal ==============================================================================

    /// Removes a body from the leaf its back-reference names.
    ///
    /// Depending on [`TreeConfig::prune_trigger`], the leaf's parent then gets a chance to
    /// collapse its four children back into a single leaf.
    ///
    /// # Errors
    ///
    /// `TreeError::NotIndexed` or `TreeError::NotInLeaf` if the body is not where its
    /// back-reference says, `TreeError::PruneFailed` if a collapse breaks.
    pub fn remove(&mut self, bodies: &mut Bodies, id: BodyId) -> Result<(), TreeError> {
        let leaf_id = bodies.body(id)?.leaf.ok_or(TreeError::NotIndexed(id))?;

        let leaf = self.node_mut(leaf_id)?;
        let held = match &mut leaf.kind {
            NodeKind::Leaf(held) => held,
            NodeKind::Internal(_) => return Err(TreeError::NotInLeaf { body: id, node: leaf_id }),
        };
        let slot = held
            .iter()
            .position(|b| *b == id)
            .ok_or(TreeError::NotInLeaf { body: id, node: leaf_id })?;
        held.swap_remove(slot);
        let now_empty = held.is_empty();
        let parent = leaf.parent;
        if now_empty {
            leaf.centroid = Centroid::default();
            leaf.centroid_valid = false;
        }

        bodies.body_mut(id)?.leaf = None;
        self.len -= 1;

        if !now_empty {
            self.invalidate_centroid(leaf_id);
        }

        let wants_prune = now_empty || self.config.prune_trigger == PruneTrigger::AnyRemoval;
        match parent {
            Some(parent) if wants_prune => self.prune_or_invalidate(bodies, parent),
            _ => Ok(()),
        }
    }

    /// Collapses the children of `node_id` into it when they are all leaves holding at
    /// most `prune_size` bodies in total, then invalidates the centroid cache upwards.
    fn prune_or_invalidate(&mut self, bodies: &mut Bodies, node_id: NodeId) -> Result<(), TreeError> {
        let node = self.node(node_id)?;
        let depth = node.depth;
        let parent = node.parent;
        let children = self.children_of(node_id)?;

        let mut collapsed = false;
        if depth >= self.config.min_depth {
            let mut total = 0;
            let mut all_leaves = true;
            for child in children {
                match &self.node(child)?.kind {
                    NodeKind::Leaf(held) => total += held.len(),
                    NodeKind::Internal(_) => all_leaves = false,
                }
            }
            if all_leaves && total <= self.config.prune_size {
                self.collapse(bodies, node_id, children)?;
                collapsed = true;
            }
        }

        self.invalidate_centroid(node_id);

        // A collapse can leave the grandparent with four sparse leaves of its own.
        if collapsed && self.config.prune_trigger == PruneTrigger::AnyRemoval {
            if let Some(parent) = parent {
                return self.prune_or_invalidate(bodies, parent);
            }
        }
        Ok(())
    }

    fn collapse(&mut self, bodies: &mut Bodies, node_id: NodeId, children: [NodeId; 4]) -> Result<(), TreeError> {
        let mut orphans = Vec::new();
        for child in children {
            if let Some(QuadNode { kind: NodeKind::Leaf(held), .. }) = self.release(child) {
                orphans.extend(held);
            }
        }
        debug!("collapsing children of {} ({} bodies)", node_id, orphans.len());

        self.node_mut(node_id)?.kind = NodeKind::Leaf(Vec::with_capacity(orphans.len()));
        for body in orphans {
            let b = bodies.body(body)?;
            let (x, y) = (b.x, b.y);
            if !self.insert_at(bodies, node_id, body, x, y)? {
                return Err(TreeError::PruneFailed { body, node: node_id });
            }
        }
        Ok(())
    }

    // centroid cache =======================================================================

    /// Marks the cached centroid of `node_id` and its ancestors stale.
    ///
    /// Stops at the first ancestor that is already stale: a valid node never has a stale
    /// descendant, so everything above it is stale too.
    pub fn invalidate_centroid(&mut self, node_id: NodeId) {
        let mut cursor = Some(node_id);
        while let Some(id) = cursor {
            let Some(node) = self.nodes.get_mut(id.0).and_then(|n| n.as_mut()) else { break };
            if !node.centroid_valid {
                break;
            }
            node.centroid.m = 0.0;
            node.centroid_valid = false;
            cursor = node.parent;
        }
    }

    /// Rebuilds the stale part of the centroid cache below `node_id` and returns its
    /// centroid.
    pub fn recalculate(&mut self, bodies: &Bodies, node_id: NodeId) -> Result<Centroid, TreeError> {
        let node = self.node(node_id)?;
        if node.centroid_valid {
            return Ok(node.centroid);
        }

        let centroid = match node.children() {
            Some(children) => {
                let mut samples = [PointMass::default(); 4];
                for (sample, child) in samples.iter_mut().zip(children) {
                    *sample = self.recalculate(bodies, child)?.point_mass();
                }
                Centroid::from_samples(samples.into_iter())
            }
            None => {
                let mut samples = Vec::with_capacity(node.bodies().len());
                for id in node.bodies() {
                    samples.push(bodies.body(*id)?.point_mass());
                }
                Centroid::from_samples(samples.into_iter())
            }
        };

        let node = self.node_mut(node_id)?;
        node.centroid = centroid;
        node.centroid_valid = true;
        Ok(centroid)
    }

    // validation ===========================================================================

    /// Walks the whole tree and checks its structural invariants against `bodies`:
    /// nesting, containment, back-references, capacity, `min_depth` and, under
    /// [`PruneTrigger::AnyRemoval`], that no four sibling leaves are sparse enough to merge.
    pub fn check_invariants(&self, bodies: &Bodies) -> Result<(), TreeError> {
        let violation = |msg: String| Err(TreeError::InvariantViolation(msg));
        let config = &self.config;
        let mut seen = HashSet::new();
        let mut stack = vec![self.root];

        while let Some(id) = stack.pop() {
            let node = self.node(id)?;
            if let Some(parent_id) = node.parent {
                let parent = self.node(parent_id)?;
                if parent.children().map_or(true, |c| !c.contains(&id)) {
                    return violation(format!("{} is not a child of its parent {}", id, parent_id));
                }
                if node.depth != parent.depth + 1 {
                    return violation(format!("{} has depth {} under depth {}", id, node.depth, parent.depth));
                }
                let (r, p) = (node.rect, parent.rect);
                if r.x0 < p.x0 || r.y0 < p.y0 || r.x1 > p.x1 || r.y1 > p.y1 {
                    return violation(format!("{} is not nested in {}", id, parent_id));
                }
            }

            match &node.kind {
                NodeKind::Internal(children) => {
                    if config.prune_trigger == PruneTrigger::AnyRemoval && node.depth >= config.min_depth {
                        let mut total = 0;
                        let mut all_leaves = true;
                        for child in children {
                            match &self.node(*child)?.kind {
                                NodeKind::Leaf(held) => total += held.len(),
                                NodeKind::Internal(_) => all_leaves = false,
                            }
                        }
                        if all_leaves && total <= config.prune_size {
                            return violation(format!("children of {} hold only {} bodies", id, total));
                        }
                    }
                    stack.extend(children.iter());
                }
                NodeKind::Leaf(held) => {
                    if node.depth < config.min_depth {
                        return violation(format!("{} is a leaf above min_depth", id));
                    }
                    if node.depth < config.max_depth && held.len() > config.max_capacity {
                        return violation(format!("{} holds {} bodies", id, held.len()));
                    }
                    for body_id in held {
                        let body = bodies.body(*body_id)?;
                        if body.leaf != Some(id) {
                            return violation(format!("{} is held by {} but points at {:?}", body_id, id, body.leaf));
                        }
                        if !node.rect.contains(body.x, body.y) {
                            return violation(format!("{} lies outside its leaf {}", body_id, id));
                        }
                        if !seen.insert(*body_id) {
                            return violation(format!("{} is held twice", body_id));
                        }
                    }
                }
            }
        }

        if seen.len() != self.len {
            return violation(format!("{} bodies reachable, {} recorded", seen.len(), self.len));
        }
        for body in bodies.iter() {
            if body.leaf.is_some() && !seen.contains(&body.id) {
                return violation(format!("{} points at a leaf that does not hold it", body.id));
            }
        }
        Ok(())
    }
}
