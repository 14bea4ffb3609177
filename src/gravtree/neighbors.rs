//! Cardinal neighbor search over the spatial index.
//!
//! For a leaf, walk up the parent chain. At every step each unresolved direction either
//! finds the neighbor's ancestor as a sibling inside the same parent, or records the
//! mirrored quadrant so the path can be replayed downwards on the other side of the
//! boundary once such a sibling turns up. Directions still unresolved at the root face
//! the edge of the domain.
use crate::gravtree::{NodeId, Quadrant, SpatialIndex};
use crate::utils::{NeighborRefinement, TreeError};

/// A cardinal direction. North is towards smaller `y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    West,
    South,
    East,
}

/// Outcome of moving one step in a direction from a child quadrant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    /// The neighbor lies in this sibling quadrant of the same parent.
    Sibling(Quadrant),
    /// The neighbor lies across the parent's edge, in the mirrored quadrant.
    Across(Quadrant),
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::North, Direction::West, Direction::South, Direction::East];

    fn step(self, from: Quadrant) -> Step {
        let (mirror, stays_inside) = match self {
            Direction::North => (from.flip_vertical(), !from.is_north()),
            Direction::South => (from.flip_vertical(), from.is_north()),
            Direction::West => (from.flip_horizontal(), !from.is_west()),
            Direction::East => (from.flip_horizontal(), from.is_west()),
        };
        if stays_inside {
            Step::Sibling(mirror)
        } else {
            Step::Across(mirror)
        }
    }

    /// Children of a neighbor in this direction that touch the node we started from.
    pub fn facing(self) -> [Quadrant; 2] {
        match self {
            Direction::North => [Quadrant::Sw, Quadrant::Se],
            Direction::West => [Quadrant::Ne, Quadrant::Se],
            Direction::South => [Quadrant::Nw, Quadrant::Ne],
            Direction::East => [Quadrant::Nw, Quadrant::Sw],
        }
    }
}

#[derive(Debug, Default)]
struct Search {
    start: Option<NodeId>,
    path: Vec<Quadrant>,
}

/// Neighbors of one node, by direction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Neighbors {
    pub north: Vec<NodeId>,
    pub west: Vec<NodeId>,
    pub south: Vec<NodeId>,
    pub east: Vec<NodeId>,
}

impl Neighbors {
    pub fn get(&self, direction: Direction) -> &[NodeId] {
        match direction {
            Direction::North => &self.north,
            Direction::West => &self.west,
            Direction::South => &self.south,
            Direction::East => &self.east,
        }
    }

    fn get_mut(&mut self, direction: Direction) -> &mut Vec<NodeId> {
        match direction {
            Direction::North => &mut self.north,
            Direction::West => &mut self.west,
            Direction::South => &mut self.south,
            Direction::East => &mut self.east,
        }
    }

    /// All neighbor nodes in north, west, south, east order.
    pub fn all(&self) -> Vec<NodeId> {
        Direction::ALL.iter().flat_map(|d| self.get(*d).iter().copied()).collect()
    }
}

impl SpatialIndex {
    /// Quadrant that `node_id` occupies in its parent, or `None` for the root.
    pub fn quadrant_of(&self, node_id: NodeId) -> Result<Option<Quadrant>, TreeError> {
        let Some(parent) = self.node(node_id)?.parent else { return Ok(None) };
        let siblings = self.node(parent)?.children().ok_or_else(|| {
            TreeError::InvariantViolation(format!("parent {} of {} is a leaf", parent, node_id))
        })?;
        Quadrant::ALL
            .into_iter()
            .find(|q| siblings[q.index()] == node_id)
            .map(Some)
            .ok_or_else(|| TreeError::InvariantViolation(format!("{} missing from parent {}", node_id, parent)))
    }

    /// Finds the north, west, south and east neighbors of `node_id`, refined according to
    /// [`TreeConfig::neighbor_refinement`](crate::utils::TreeConfig).
    ///
    /// Neighbors are never ancestors of `node_id` and never overlap each other.
    pub fn neighbors(&self, node_id: NodeId) -> Result<Neighbors, TreeError> {
        let mut searches: [Search; 4] = Default::default();

        let mut current = node_id;
        while let Some(quadrant) = self.quadrant_of(current)? {
            if searches.iter().all(|s| s.start.is_some()) {
                break;
            }
            let parent = self.node(current)?.parent.ok_or(TreeError::StaleNode(current))?;
            let siblings = self.node(parent)?.children().ok_or(TreeError::StaleNode(parent))?;

            for (direction, search) in Direction::ALL.iter().zip(searches.iter_mut()) {
                if search.start.is_some() {
                    continue;
                }
                match direction.step(quadrant) {
                    Step::Sibling(q) => search.start = Some(siblings[q.index()]),
                    Step::Across(q) => search.path.push(q),
                }
            }
            current = parent;
        }

        let mut neighbors = Neighbors::default();
        for (direction, search) in Direction::ALL.into_iter().zip(searches) {
            if let Some(start) = search.start {
                self.descend(direction, start, &search.path, neighbors.get_mut(direction))?;
            }
        }
        Ok(neighbors)
    }

    /// Replays `path` (recorded bottom-up) from `start` and pushes the result.
    fn descend(
        &self,
        direction: Direction,
        start: NodeId,
        path: &[Quadrant],
        out: &mut Vec<NodeId>,
    ) -> Result<(), TreeError> {
        let mut node = start;
        let mut replayed = 0;
        for quadrant in path.iter().rev() {
            match self.node(node)?.child(*quadrant) {
                Some(child) => {
                    node = child;
                    replayed += 1;
                }
                None => break,
            }
        }

        if self.config().neighbor_refinement == NeighborRefinement::TwoSublevels && replayed == path.len() {
            if let Some(children) = self.node(node)?.children() {
                let [first, second] = direction.facing();
                for facing in [first, second] {
                    let sub = children[facing.index()];
                    match self.node(sub)?.children() {
                        Some(grandchildren) => {
                            out.push(grandchildren[first.index()]);
                            out.push(grandchildren[second.index()]);
                        }
                        None => out.push(sub),
                    }
                }
                return Ok(());
            }
        }

        out.push(node);
        Ok(())
    }
}
