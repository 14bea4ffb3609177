use std::fmt;

use crate::gravtree::{BodyId, PointMass};

/// Handle to a node in the spatial index's arena.
///
/// A handle stays valid until the node is freed by a collapse; the slot may then be
/// reused by a later subdivision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// An axis-aligned half-open rectangle `[x0, x1) x [y0, y1)`.
///
/// North is towards `y0`, west is towards `x0`.
///
/// # Examples
///
/// ```
/// use gravtree::gravtree::Rect;
///
/// let rect = Rect::new(0.0, 0.0, 2.0, 2.0);
/// assert!(rect.contains(0.0, 0.0));
/// assert!(rect.contains(1.999, 1.0));
/// assert!(!rect.contains(2.0, 1.0)); // upper bound is exclusive
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Rect { x0, y0, x1, y1 }
    }

    /// Returns true if the point (x, y) is inside this rectangle.
    ///
    /// Lower bounds are inclusive and upper bounds exclusive, so a point on a shared edge
    /// belongs to exactly one of two neighboring rectangles.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Splits the rectangle at its midpoint into (NW, NE, SW, SE).
    ///
    /// Every child shares the same midpoint values, so the four halves tile the parent
    /// without gaps.
    ///
    /// # Examples
    ///
    /// ```
    /// use gravtree::gravtree::Rect;
    ///
    /// let rect = Rect::new(0.0, 0.0, 2.0, 2.0);
    /// let [nw, ne, sw, se] = rect.subdivide();
    /// assert_eq!(nw, Rect::new(0.0, 0.0, 1.0, 1.0));
    /// assert_eq!(ne, Rect::new(1.0, 0.0, 2.0, 1.0));
    /// assert_eq!(sw, Rect::new(0.0, 1.0, 1.0, 2.0));
    /// assert_eq!(se, Rect::new(1.0, 1.0, 2.0, 2.0));
    /// ```
    pub fn subdivide(&self) -> [Rect; 4] {
        let x_mid = self.x0 + (self.x1 - self.x0) / 2.0;
        let y_mid = self.y0 + (self.y1 - self.y0) / 2.0;
        [
            Rect::new(self.x0, self.y0, x_mid, y_mid), // NW
            Rect::new(x_mid, self.y0, self.x1, y_mid), // NE
            Rect::new(self.x0, y_mid, x_mid, self.y1), // SW
            Rect::new(x_mid, y_mid, self.x1, self.y1), // SE
        ]
    }
}

/// Position of a child inside its parent. The discriminant is the index into the
/// parent's child array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Quadrant {
    Nw = 0,
    Ne = 1,
    Sw = 2,
    Se = 3,
}

impl Quadrant {
    /// Insertion order.
    pub const ALL: [Quadrant; 4] = [Quadrant::Nw, Quadrant::Ne, Quadrant::Sw, Quadrant::Se];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_north(self) -> bool {
        matches!(self, Quadrant::Nw | Quadrant::Ne)
    }

    pub fn is_west(self) -> bool {
        matches!(self, Quadrant::Nw | Quadrant::Sw)
    }

    /// Mirror across the horizontal midline (north <-> south).
    pub fn flip_vertical(self) -> Quadrant {
        match self {
            Quadrant::Nw => Quadrant::Sw,
            Quadrant::Ne => Quadrant::Se,
            Quadrant::Sw => Quadrant::Nw,
            Quadrant::Se => Quadrant::Ne,
        }
    }

    /// Mirror across the vertical midline (west <-> east).
    pub fn flip_horizontal(self) -> Quadrant {
        match self {
            Quadrant::Nw => Quadrant::Ne,
            Quadrant::Ne => Quadrant::Nw,
            Quadrant::Sw => Quadrant::Se,
            Quadrant::Se => Quadrant::Sw,
        }
    }
}

/// Leaf or internal, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Leaf(Vec<BodyId>),
    /// Children in [`Quadrant`] order.
    Internal([NodeId; 4]),
}

/// Cached total mass and mass-weighted centroid of a subtree.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Centroid {
    pub m: f64,
    pub x: f64,
    pub y: f64,
}

impl Centroid {
    pub fn point_mass(&self) -> PointMass {
        PointMass { x: self.x, y: self.y, mass: self.m }
    }

    /// Aggregates `(mass, x, y)` samples. A zero total mass yields the origin.
    pub fn from_samples(samples: impl Iterator<Item = PointMass>) -> Self {
        let mut m = 0.0;
        let mut wx = 0.0;
        let mut wy = 0.0;
        for p in samples {
            m += p.mass;
            wx += p.x * p.mass;
            wy += p.y * p.mass;
        }
        if m > 0.0 {
            Centroid { m, x: wx / m, y: wy / m }
        } else {
            Centroid { m, x: 0.0, y: 0.0 }
        }
    }
}

/// One node of the spatial index.
#[derive(Debug, Clone)]
pub struct QuadNode {
    pub rect: Rect,
    pub depth: u32,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
    pub(crate) centroid: Centroid,
    pub(crate) centroid_valid: bool,
}

impl QuadNode {
    pub(crate) fn new(rect: Rect, depth: u32, parent: Option<NodeId>) -> Self {
        QuadNode {
            rect,
            depth,
            parent,
            kind: NodeKind::Leaf(Vec::new()),
            centroid: Centroid::default(),
            centroid_valid: false,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    pub fn children(&self) -> Option<[NodeId; 4]> {
        match self.kind {
            NodeKind::Internal(children) => Some(children),
            NodeKind::Leaf(_) => None,
        }
    }

    pub fn child(&self, quadrant: Quadrant) -> Option<NodeId> {
        self.children().map(|c| c[quadrant.index()])
    }

    /// Bodies held directly. Empty for internal nodes.
    pub fn bodies(&self) -> &[BodyId] {
        match &self.kind {
            NodeKind::Leaf(bodies) => bodies,
            NodeKind::Internal(_) => &[],
        }
    }

    pub fn centroid_valid(&self) -> bool {
        self.centroid_valid
    }
}
