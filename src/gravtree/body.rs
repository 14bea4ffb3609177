use std::collections::BTreeMap;
use std::fmt;

use crate::gravtree::NodeId;
use crate::utils::TreeError;

/// Identity of a body, unique for the lifetime of the [`Bodies`] store that issued it.
///
/// Ids only key the pairwise force cache and break ties; they carry no spatial meaning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyId(pub u64);

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A position and a mass, the only data the force law looks at.
///
/// Bodies and subtree centroids are both reduced to a `PointMass` before a force is computed.
///
/// # Examples
///
/// ```
/// use gravtree::gravtree::PointMass;
///
/// let p = PointMass { x: 1.0, y: 2.0, mass: 3.0 };
/// assert_eq!(p.x, 1.0);
/// assert_eq!(p.mass, 3.0);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointMass {
    pub x: f64,
    pub y: f64,
    pub mass: f64,
}

/// A point mass taking part in the simulation.
#[derive(Debug, Clone)]
pub struct Body {
    pub id: BodyId,
    pub x: f64,
    pub y: f64,
    pub m: f64,
    /// Net force written by the last force pass.
    pub fx: f64,
    pub fy: f64,
    /// Acceleration derived from the force by the integrator.
    pub ax: f64,
    pub ay: f64,
    pub vx: f64,
    pub vy: f64,
    /// Leaf currently holding this body. Only the spatial index writes this.
    pub(crate) leaf: Option<NodeId>,
}

impl Body {
    pub fn point_mass(&self) -> PointMass {
        PointMass { x: self.x, y: self.y, mass: self.m }
    }

    /// The leaf holding this body, if it is indexed.
    pub fn leaf(&self) -> Option<NodeId> {
        self.leaf
    }
}

/// Owner of every body and of the id counter.
///
/// Ids are handed out in increasing order and never reused, so iteration (ascending id)
/// is also creation order.
///
/// # Examples
///
/// ```
/// use gravtree::gravtree::Bodies;
///
/// let mut bodies = Bodies::new();
/// let a = bodies.spawn(0.0, 0.0, 1.0).unwrap();
/// let b = bodies.spawn(1.0, 0.0, 2.0).unwrap();
/// assert!(a < b);
/// assert_eq!(bodies.len(), 2);
///
/// bodies.despawn(a);
/// assert!(bodies.get(a).is_none());
/// assert_eq!(bodies.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Bodies {
    bodies: BTreeMap<BodyId, Body>,
    next_id: u64,
}

impl Bodies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a body at rest and returns its id.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::InvalidMass` if `m` is negative or not finite.
    pub fn spawn(&mut self, x: f64, y: f64, m: f64) -> Result<BodyId, TreeError> {
        if !m.is_finite() || m < 0.0 {
            return Err(TreeError::InvalidMass);
        }
        let id = BodyId(self.next_id);
        self.next_id += 1;
        self.bodies.insert(id, Body {
            id,
            x,
            y,
            m,
            fx: 0.0,
            fy: 0.0,
            ax: 0.0,
            ay: 0.0,
            vx: 0.0,
            vy: 0.0,
            leaf: None,
        });
        Ok(id)
    }

    /// Removes the body from the store. The caller must have removed it from any index first.
    pub fn despawn(&mut self, id: BodyId) -> Option<Body> {
        self.bodies.remove(&id)
    }

    pub fn get(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(&id)
    }

    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.get_mut(&id)
    }

    /// Like [`Bodies::get`] but reports a missing body as an error.
    pub fn body(&self, id: BodyId) -> Result<&Body, TreeError> {
        self.get(id).ok_or(TreeError::UnknownBody(id))
    }

    pub fn body_mut(&mut self, id: BodyId) -> Result<&mut Body, TreeError> {
        self.get_mut(id).ok_or(TreeError::UnknownBody(id))
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Body> {
        self.bodies.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Body> {
        self.bodies.values_mut()
    }

    pub fn ids(&self) -> Vec<BodyId> {
        self.bodies.keys().copied().collect()
    }
}
