//! Hybrid near-field / far-field force evaluation over the spatial index.
//!
//! Every leaf is evaluated on its own. Its bodies interact exactly with each other and
//! with every body under the leaf's cardinal neighbors; every other subtree is reduced to
//! a single point mass at its cached centroid. Which subtrees count as "other" is worked
//! out by marking the near field and its ancestors, then scanning down from the root
//! through marked ancestors only.
//!
//! # Example
//!
//! ```
//! use gravtree::gravtree::{Bodies, Rect, SpatialIndex};
//! use gravtree::utils::{GravityConstants, TreeConfig};
//!
//! let mut bodies = Bodies::new();
//! let mut index = SpatialIndex::new(Rect::new(0.0, 0.0, 2.0, 2.0), TreeConfig::default()).unwrap();
//! let a = bodies.spawn(0.0, 0.0, 1.0).unwrap();
//! let b = bodies.spawn(1.0, 0.0, 1.0).unwrap();
//! index.insert(&mut bodies, a).unwrap();
//! index.insert(&mut bodies, b).unwrap();
//!
//! let constants = GravityConstants::new(Some(1.0), None, None);
//! index.evaluate_forces(&mut bodies, &constants).unwrap();
//!
//! // Unit masses one unit apart: |F| = G * m * m / d = 1.
//! assert!((bodies.body(a).unwrap().fx - 1.0).abs() < 1e-12);
//! assert!((bodies.body(b).unwrap().fx + 1.0).abs() < 1e-12);
//! ```
use std::collections::HashMap;

use log::debug;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::gravtree::{Bodies, Body, BodyId, NodeId, PointMass, SpatialIndex};
use crate::utils::{GravityConstants, TreeError};

/// Force exerted on `a` by `b`.
///
/// The magnitude is `G * ma * mb / distance` (inverse distance, not inverse square),
/// directed from `a` towards `b`. It is zero when either mass is below
/// `massless_threshold`, or when `(b.x - a.x) + (b.y - a.y)` lies strictly inside
/// `±coalescence_guard`. The guard looks at the sum of the deltas, so pairs that are far
/// apart along the anti-diagonal are also treated as coalesced.
///
/// # Examples
///
/// ```
/// use gravtree::gravtree::{pair_force, PointMass};
/// use gravtree::utils::GravityConstants;
///
/// let constants = GravityConstants::new(Some(1.0), None, None);
/// let a = PointMass { x: 0.0, y: 0.0, mass: 2.0 };
/// let b = PointMass { x: 0.0, y: 4.0, mass: 3.0 };
/// let (fx, fy) = pair_force(a, b, &constants);
/// assert_eq!(fx, 0.0);
/// assert!((fy - 1.5).abs() < 1e-12);
/// ```
pub fn pair_force(a: PointMass, b: PointMass, constants: &GravityConstants) -> (f64, f64) {
    if a.mass < constants.massless_threshold || b.mass < constants.massless_threshold {
        return (0.0, 0.0);
    }

    let dx = b.x - a.x;
    let dy = b.y - a.y;
    if (dx + dy).abs() < constants.coalescence_guard {
        return (0.0, 0.0);
    }

    let dist = (dx * dx + dy * dy).sqrt();
    let force = constants.g * a.mass * b.mass / dist;
    ((dx / dist) * force, (dy / dist) * force)
}

/// Pairwise body forces for one force pass, keyed by the unordered pair of ids.
///
/// The stored vector is always the force on the smaller id, computed with the smaller id
/// first; asking for the reverse pair returns it negated.
#[derive(Debug, Default)]
pub struct PairCache {
    forces: HashMap<(BodyId, BodyId), (f64, f64)>,
}

impl PairCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force exerted on `a` by `b`.
    pub fn force(&mut self, a: &Body, b: &Body, constants: &GravityConstants) -> (f64, f64) {
        if a.id < b.id {
            *self
                .forces
                .entry((a.id, b.id))
                .or_insert_with(|| pair_force(a.point_mass(), b.point_mass(), constants))
        } else {
            let (fx, fy) = *self
                .forces
                .entry((b.id, a.id))
                .or_insert_with(|| pair_force(b.point_mass(), a.point_mass(), constants));
            (-fx, -fy)
        }
    }

    pub fn len(&self) -> usize {
        self.forces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    pub fn clear(&mut self) {
        self.forces.clear();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mark {
    /// Ancestor of the near field: descend while collecting the far field.
    Scan,
    /// Near field: handled exactly, never descended while collecting the far field.
    Exact,
}

/// Per-leaf scratch marks. Cleared after each leaf, never stored on the nodes.
#[derive(Debug, Default)]
pub(super) struct Marks {
    marks: HashMap<NodeId, Mark>,
}

impl Marks {
    fn mark_near_field(&mut self, index: &SpatialIndex, near: &[NodeId]) -> Result<(), TreeError> {
        for &node in near {
            self.marks.insert(node, Mark::Exact);
            let mut cursor = index.node(node)?.parent;
            while let Some(ancestor) = cursor {
                if self.marks.contains_key(&ancestor) {
                    break;
                }
                self.marks.insert(ancestor, Mark::Scan);
                cursor = index.node(ancestor)?.parent;
            }
        }
        Ok(())
    }

    fn get(&self, node: NodeId) -> Option<Mark> {
        self.marks.get(&node).copied()
    }

    fn clear(&mut self) {
        self.marks.clear();
    }
}

/// Subtrees outside the marked near field, as seen from the root.
fn collect_far_field(index: &SpatialIndex, marks: &Marks) -> Result<Vec<NodeId>, TreeError> {
    let mut far = Vec::new();
    if marks.get(index.root()) == Some(Mark::Exact) {
        return Ok(far);
    }

    let mut stack = vec![index.root()];
    while let Some(node) = stack.pop() {
        let Some(children) = index.node(node)?.children() else { continue };
        for child in children {
            match marks.get(child) {
                None => far.push(child),
                Some(Mark::Scan) => stack.push(child),
                Some(Mark::Exact) => {}
            }
        }
    }
    Ok(far)
}

/// Every body held anywhere below `roots`.
pub(super) fn collect_bodies(index: &SpatialIndex, roots: &[NodeId]) -> Result<Vec<BodyId>, TreeError> {
    let mut found = Vec::new();
    let mut stack = roots.to_vec();
    while let Some(node) = stack.pop() {
        let node = index.node(node)?;
        match node.children() {
            Some(children) => stack.extend(children),
            None => found.extend_from_slice(node.bodies()),
        }
    }
    Ok(found)
}

/// Splits the tree as seen from `leaf`: the near field (`leaf` first, then its
/// neighbors) and the roots of the far-field subtrees. Every indexed body sits below
/// exactly one of the returned nodes.
pub(super) fn split_fields(
    index: &SpatialIndex,
    leaf: NodeId,
    marks: &mut Marks,
) -> Result<(Vec<NodeId>, Vec<NodeId>), TreeError> {
    let neighbors = index.neighbors(leaf)?.all();

    let mut near = Vec::with_capacity(neighbors.len() + 1);
    near.push(leaf);
    near.extend_from_slice(&neighbors);
    marks.mark_near_field(index, &near)?;
    let far = collect_far_field(index, marks);
    marks.clear();
    Ok((near, far?))
}

/// Net force on every body of `leaf`, appended to `out`.
///
/// Expects the centroid cache of the whole tree to be valid.
fn leaf_forces(
    index: &SpatialIndex,
    bodies: &Bodies,
    leaf: NodeId,
    constants: &GravityConstants,
    cache: &mut PairCache,
    marks: &mut Marks,
    out: &mut Vec<(BodyId, (f64, f64))>,
) -> Result<(), TreeError> {
    let (near, far_roots) = split_fields(index, leaf, marks)?;

    let mut far = Vec::with_capacity(far_roots.len());
    for node in far_roots {
        let centroid = index.centroid(node)?.ok_or_else(|| {
            TreeError::InvariantViolation(format!("stale centroid on {} during a force pass", node))
        })?;
        far.push(centroid.point_mass());
    }

    let near_bodies = collect_bodies(index, &near[1..])?;
    let held = index.node(leaf)?.bodies();

    for (j, &id) in held.iter().enumerate() {
        let p = bodies.body(id)?;
        let (mut fx, mut fy) = (0.0, 0.0);

        for (k, &other) in held.iter().enumerate() {
            if j == k {
                continue;
            }
            let (dfx, dfy) = cache.force(p, bodies.body(other)?, constants);
            fx += dfx;
            fy += dfy;
        }

        for &other in &near_bodies {
            let (dfx, dfy) = cache.force(p, bodies.body(other)?, constants);
            fx += dfx;
            fy += dfy;
        }

        for centroid in &far {
            let (dfx, dfy) = pair_force(p.point_mass(), *centroid, constants);
            fx += dfx;
            fy += dfy;
        }

        out.push((id, (fx, fy)));
    }
    Ok(())
}

fn apply_forces(
    bodies: &mut Bodies,
    forces: impl IntoIterator<Item = (BodyId, (f64, f64))>,
) -> Result<usize, TreeError> {
    let mut written = 0;
    for (id, (fx, fy)) in forces {
        let body = bodies.body_mut(id)?;
        body.fx = fx;
        body.fy = fy;
        written += 1;
    }
    Ok(written)
}

impl SpatialIndex {
    /// Recomputes and overwrites `fx, fy` of every indexed body.
    ///
    /// An error here means an invariant of the tree is broken.
    pub fn evaluate_forces(&mut self, bodies: &mut Bodies, constants: &GravityConstants) -> Result<(), TreeError> {
        let root = self.root();
        self.recalculate(bodies, root)?;

        let index: &SpatialIndex = self;
        let leaves = index.leaves();
        let mut cache = PairCache::new();
        let mut marks = Marks::default();
        let mut forces = Vec::with_capacity(index.len());
        for &leaf in &leaves {
            leaf_forces(index, bodies, leaf, constants, &mut cache, &mut marks, &mut forces)?;
        }

        let written = apply_forces(bodies, forces)?;
        debug!("force pass: {} leaves, {} bodies, {} cached pairs", leaves.len(), written, cache.len());
        Ok(())
    }

    /// Same result as [`SpatialIndex::evaluate_forces`], with leaves spread over the rayon
    /// pool. Each leaf gets its own pair cache and marks.
    #[cfg(feature = "parallel")]
    pub fn evaluate_forces_parallel(
        &mut self,
        bodies: &mut Bodies,
        constants: &GravityConstants,
    ) -> Result<(), TreeError> {
        let root = self.root();
        self.recalculate(bodies, root)?;

        let index: &SpatialIndex = self;
        let shared: &Bodies = bodies;
        let leaves = index.leaves();
        let per_leaf: Vec<Vec<(BodyId, (f64, f64))>> = leaves
            .par_iter()
            .map(|&leaf| -> Result<Vec<(BodyId, (f64, f64))>, TreeError> {
                let mut cache = PairCache::new();
                let mut marks = Marks::default();
                let mut forces = Vec::new();
                leaf_forces(index, shared, leaf, constants, &mut cache, &mut marks, &mut forces)?;
                Ok(forces)
            })
            .collect::<Result<_, _>>()?;

        let written = apply_forces(bodies, per_leaf.into_iter().flatten())?;
        debug!(
            "parallel force pass: {} leaves, {} bodies on {} threads",
            leaves.len(),
            written,
            rayon::current_num_threads()
        );
        Ok(())
    }
}

/// Exact all-pairs forces on every body in `bodies`, in ascending id order.
///
/// Uses the same pair cache as the tree, so every pair contributes exactly the vector the
/// tree's near field would use for it.
pub fn brute_force(bodies: &Bodies, constants: &GravityConstants) -> Vec<(BodyId, (f64, f64))> {
    let all: Vec<&Body> = bodies.iter().collect();
    let mut cache = PairCache::new();
    all.iter()
        .map(|p| {
            let (mut fx, mut fy) = (0.0, 0.0);
            for q in &all {
                if p.id == q.id {
                    continue;
                }
                let (dfx, dfy) = cache.force(p, q, constants);
                fx += dfx;
                fy += dfy;
            }
            (p.id, (fx, fy))
        })
        .collect()
}
