//! Two-dimensional gravitational N-body simulation using the Barnes-Hut
//! approximation.
//!
//! Each frame rebuilds a quadtree over the current body positions,
//! evaluates per-body forces by walking the tree with an opening-angle
//! admissibility test, and advances every body with a semi-implicit Euler
//! step. The force and integration phases can run sequentially, on a fixed
//! worker pool over bounded queues, or on a work-stealing scheduler backed
//! by lock-free deques.

pub mod body;
pub mod error;
pub mod gravity;
pub mod integrator;
pub mod io;
pub mod quadtree;
pub mod scheduler;

pub use body::Body;
pub use error::SimError;
pub use quadtree::{QuadTree, Region, DEFAULT_MARGIN};

use log::trace;
use nalgebra::Vector2;

/// How the per-frame force and integration work is distributed.
#[derive(Clone, Copy, Debug)]
pub enum Execution {
    SingleThreaded,
    Pooled { num_workers: usize },
    WorkStealing { num_workers: usize },
}

/// Frame-stepping parameters.
#[derive(Clone, Copy, Debug)]
pub struct SimParams {
    /// Gravitational constant.
    pub g: f64,
    /// Opening-angle threshold; smaller means more accuracy and recursion.
    pub theta: f64,
    /// Time step per frame.
    pub dt: f64,
    /// Outward expansion of the root region beyond the bounding box.
    pub margin: f64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            g: gravity::DEFAULT_G,
            theta: 0.5,
            dt: 0.01,
            margin: DEFAULT_MARGIN,
        }
    }
}

/// Advances one frame with no parallelism.
pub fn step_sequential(
    bodies: &mut [Body],
    region: Region,
    params: &SimParams,
) -> Result<(), SimError> {
    if bodies.is_empty() {
        return Ok(());
    }
    let tree = QuadTree::build(bodies, region)?;

    let mut forces = vec![Vector2::zeros(); bodies.len()];
    for leaf in tree.occupied_leaves() {
        for (index, force) in gravity::leaf_forces(leaf, tree.root(), bodies, params.g, params.theta)
        {
            forces[index] = force;
        }
    }
    for (body, force) in bodies.iter_mut().zip(forces) {
        body.force = force;
    }

    for body in bodies.iter_mut() {
        integrator::advance(body, params.dt)?;
    }
    Ok(())
}

/// Advances one frame on a fixed worker pool over bounded queues.
pub fn step_pooled(
    bodies: &mut [Body],
    region: Region,
    params: &SimParams,
    num_workers: usize,
) -> Result<(), SimError> {
    if bodies.is_empty() {
        return Ok(());
    }
    let num_workers = num_workers.max(1);
    let tree = QuadTree::build(bodies, region)?;

    let forces = scheduler::pool::force_phase(&tree, bodies, params, num_workers);
    apply_forces(bodies, forces);

    let updates = scheduler::pool::integrate_phase(bodies, params.dt, num_workers)?;
    apply_updates(bodies, updates);
    Ok(())
}

/// Advances one frame on the work-stealing scheduler.
pub fn step_work_stealing(
    bodies: &mut [Body],
    region: Region,
    params: &SimParams,
    num_workers: usize,
) -> Result<(), SimError> {
    if bodies.is_empty() {
        return Ok(());
    }
    let num_workers = num_workers.max(1);
    let tree = QuadTree::build(bodies, region)?;

    let forces = scheduler::stealing::force_phase(&tree, bodies, params, num_workers)?;
    apply_forces(bodies, forces);

    let updates = scheduler::stealing::integrate_phase(&tree, bodies, params, num_workers)?;
    apply_updates(bodies, updates);
    Ok(())
}

fn apply_forces(bodies: &mut [Body], forces: Vec<(usize, Vector2<f64>)>) {
    for body in bodies.iter_mut() {
        body.force = Vector2::zeros();
    }
    for (index, force) in forces {
        bodies[index].force = force;
    }
}

fn apply_updates(bodies: &mut [Body], updates: Vec<(usize, Vector2<f64>, Vector2<f64>)>) {
    for (index, velocity, position) in updates {
        bodies[index].velocity = velocity;
        bodies[index].position = position;
    }
}

/// Owns the bodies and advances them frame by frame.
#[derive(Clone, Debug)]
pub struct Simulation {
    bodies: Vec<Body>,
    params: SimParams,
    execution: Execution,
}

impl Simulation {
    #[must_use]
    pub fn new(bodies: Vec<Body>, params: SimParams) -> Self {
        Self {
            bodies,
            params,
            execution: Execution::SingleThreaded,
        }
    }

    #[must_use]
    pub fn pooled(mut self, num_workers: usize) -> Self {
        self.execution = Execution::Pooled { num_workers };
        self
    }

    #[must_use]
    pub fn work_stealing(mut self, num_workers: usize) -> Self {
        self.execution = Execution::WorkStealing { num_workers };
        self
    }

    #[must_use]
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    /// Advances a single frame. The root region is recomputed as the
    /// bounding box of all bodies expanded by the configured margin.
    pub fn step(&mut self) -> Result<(), SimError> {
        let region = Region::enclosing(&self.bodies, self.params.margin);
        trace!(
            "stepping {} bodies over [{:?}, {:?}]",
            self.bodies.len(),
            region.min,
            region.max
        );
        match self.execution {
            Execution::SingleThreaded => step_sequential(&mut self.bodies, region, &self.params),
            Execution::Pooled { num_workers } => {
                step_pooled(&mut self.bodies, region, &self.params, num_workers)
            }
            Execution::WorkStealing { num_workers } => {
                step_work_stealing(&mut self.bodies, region, &self.params, num_workers)
            }
        }
    }

    /// Runs `frames` frames, handing the full body list to `recorder`
    /// after each one.
    pub fn run(
        &mut self,
        frames: usize,
        mut recorder: impl FnMut(usize, &[Body]),
    ) -> Result<(), SimError> {
        for frame in 0..frames {
            self.step()?;
            recorder(frame, &self.bodies);
        }
        Ok(())
    }
}
