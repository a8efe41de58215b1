use std::collections::VecDeque;

use nalgebra::Vector2;

use crate::{body::Body, error::SimError};

/// Extra space added around the bounding box of all bodies so that no body
/// sits exactly on the root's max edge, which the half-open membership rule
/// would exclude.
pub const DEFAULT_MARGIN: f64 = 1.0;

/// Leaves at this depth stop subdividing and may keep several residents.
/// Bodies at (near-)identical coordinates would otherwise recurse forever.
pub(crate) const MAX_DEPTH: u32 = 64;

/// An axis-aligned rectangle, `min` inclusive, `max` exclusive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region {
    pub min: Vector2<f64>,
    pub max: Vector2<f64>,
}

impl Region {
    #[must_use]
    pub fn new(min: Vector2<f64>, max: Vector2<f64>) -> Self {
        Self { min, max }
    }

    /// Bounding box of all bodies, expanded by `margin` on every side.
    #[must_use]
    pub fn enclosing(bodies: &[Body], margin: f64) -> Self {
        let mut min = Vector2::new(f64::INFINITY, f64::INFINITY);
        let mut max = Vector2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for body in bodies {
            min.x = min.x.min(body.position.x);
            min.y = min.y.min(body.position.y);
            max.x = max.x.max(body.position.x);
            max.y = max.y.max(body.position.y);
        }
        if bodies.is_empty() {
            min = Vector2::zeros();
            max = Vector2::zeros();
        }
        let margin = Vector2::new(margin, margin);
        Self::new(min - margin, max + margin)
    }

    fn contains(&self, p: &Vector2<f64>) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    /// Midpoint-split quadrant: bit 0 of `index` selects the upper x half,
    /// bit 1 the upper y half. Child rectangles are derived on demand and
    /// never stored.
    fn quadrant(&self, index: usize) -> Self {
        let mid = (self.min + self.max) / 2.;
        let (min_x, max_x) = if index & 1 == 1 {
            (mid.x, self.max.x)
        } else {
            (self.min.x, mid.x)
        };
        let (min_y, max_y) = if index & 2 == 2 {
            (mid.y, self.max.y)
        } else {
            (self.min.y, mid.y)
        };
        Self::new(Vector2::new(min_x, min_y), Vector2::new(max_x, max_y))
    }

    /// Diagonal length, the cluster size used by the opening-angle test.
    #[must_use]
    pub fn diagonal(&self) -> f64 {
        (self.max - self.min).norm()
    }
}

/// One node of the quadrant partition.
///
/// A node is a leaf iff all four children are `None`; it becomes internal
/// exactly once, when it subdivides. `total_mass` and `center` are the
/// running mass-weighted aggregates over everything inserted at or below
/// the node.
#[derive(Clone, Debug)]
pub struct QuadNode {
    region: Region,
    children: [Option<Box<QuadNode>>; 4],
    total_mass: f64,
    center: Vector2<f64>,
    bodies: Vec<usize>,
    depth: u32,
}

impl QuadNode {
    fn new(region: Region, depth: u32) -> Self {
        Self {
            region,
            children: Default::default(),
            total_mass: 0.,
            center: Vector2::zeros(),
            bodies: Vec::new(),
            depth,
        }
    }

    #[must_use]
    pub fn region(&self) -> Region {
        self.region
    }

    #[must_use]
    pub fn total_mass(&self) -> f64 {
        self.total_mass
    }

    #[must_use]
    pub fn center(&self) -> Vector2<f64> {
        self.center
    }

    /// Indices of the resident bodies. Non-empty only on leaves.
    #[must_use]
    pub fn bodies(&self) -> &[usize] {
        &self.bodies
    }

    #[must_use]
    pub fn children(&self) -> &[Option<Box<QuadNode>>; 4] {
        &self.children
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(|c| c.is_none())
    }

    fn insert(&mut self, bodies: &[Body], index: usize) -> Result<(), SimError> {
        let body = &bodies[index];
        self.total_mass += body.mass;
        if self.total_mass > 0. {
            let previous = self.total_mass - body.mass;
            self.center = (self.center * previous + body.position * body.mass) / self.total_mass;
        }

        if self.is_leaf() {
            self.bodies.push(index);
            if self.bodies.len() >= 2 && self.depth < MAX_DEPTH {
                self.subdivide(bodies)?;
            }
            return Ok(());
        }
        self.insert_into_child(bodies, index)
    }

    fn insert_into_child(&mut self, bodies: &[Body], index: usize) -> Result<(), SimError> {
        let position = bodies[index].position;
        for quadrant in 0..4 {
            let region = self.region.quadrant(quadrant);
            if region.contains(&position) {
                let depth = self.depth + 1;
                let child = self.children[quadrant]
                    .get_or_insert_with(|| Box::new(QuadNode::new(region, depth)));
                return child.insert(bodies, index);
            }
        }
        Err(SimError::OutsideRegion {
            name: bodies[index].name.clone(),
            x: position.x,
            y: position.y,
        })
    }

    /// Redistributes all residents into lazily created children. Re-insertion
    /// may subdivide a child again when residents share a quadrant.
    fn subdivide(&mut self, bodies: &[Body]) -> Result<(), SimError> {
        let residents = std::mem::take(&mut self.bodies);
        for index in residents {
            self.insert_into_child(bodies, index)?;
        }
        Ok(())
    }
}

/// The spatial partition for one frame.
///
/// Built single-threaded from the frame's body snapshot and discarded in
/// full afterwards; it is read-only while force evaluation is in flight.
#[derive(Clone, Debug)]
pub struct QuadTree {
    root: QuadNode,
}

impl QuadTree {
    /// Constructs a root over `region` and inserts every body in input
    /// order, updating the aggregates of every visited ancestor.
    pub fn build(bodies: &[Body], region: Region) -> Result<Self, SimError> {
        let mut root = QuadNode::new(region, 0);
        for index in 0..bodies.len() {
            root.insert(bodies, index)?;
        }
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &QuadNode {
        &self.root
    }

    /// Breadth-first collection of every leaf with at least one resident.
    /// Internal and empty nodes are structural only and never returned.
    #[must_use]
    pub fn occupied_leaves(&self) -> Vec<&QuadNode> {
        let mut leaves = Vec::new();
        let mut frontier = VecDeque::from([&self.root]);
        while let Some(node) = frontier.pop_front() {
            if !node.bodies.is_empty() {
                leaves.push(node);
            }
            for child in node.children.iter().flatten() {
                frontier.push_back(child);
            }
        }
        leaves
    }
}
