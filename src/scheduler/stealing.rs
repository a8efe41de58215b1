//! Work-stealing scheduler: one deque per worker, idle workers redistribute
//! work from busy peers instead of blocking on a barrier.
//!
//! Tasks for a phase are distributed round-robin before the workers start,
//! with one [`Task::Terminate`] sentinel pushed last per deque. A worker
//! drains its own queue from the head; on empty it tries each peer's tail
//! in turn and exits once nothing is available anywhere, or immediately
//! when it pops its own sentinel. Joining the worker scope separates the
//! force phase from the integration phase.

use std::thread;

use nalgebra::Vector2;

use crate::{
    body::Body,
    error::SimError,
    gravity, integrator,
    quadtree::{QuadNode, QuadTree},
    SimParams,
};

use super::{Deque, Task};

struct PhaseCtx<'a> {
    root: &'a QuadNode,
    bodies: &'a [Body],
    g: f64,
    theta: f64,
    dt: f64,
}

#[derive(Default)]
struct PhaseOutput {
    forces: Vec<(usize, Vector2<f64>)>,
    updates: Vec<(usize, Vector2<f64>, Vector2<f64>)>,
}

/// Force phase: occupied leaves are dealt round-robin across per-worker
/// deques and run to completion.
pub(crate) fn force_phase(
    tree: &QuadTree,
    bodies: &[Body],
    params: &SimParams,
    num_workers: usize,
) -> Result<Vec<(usize, Vector2<f64>)>, SimError> {
    let queues: Vec<Deque<Task<'_>>> = (0..num_workers).map(|_| Deque::new()).collect();
    for (i, leaf) in tree.occupied_leaves().into_iter().enumerate() {
        queues[i % num_workers].push(Task::NodeForce(leaf));
    }
    for queue in &queues {
        queue.push(Task::Terminate);
    }

    let ctx = PhaseCtx {
        root: tree.root(),
        bodies,
        g: params.g,
        theta: params.theta,
        dt: params.dt,
    };
    run_workers(&queues, &ctx).map(|out| out.forces)
}

/// Integration phase: one task per body, fresh deques, same worker loop.
pub(crate) fn integrate_phase(
    tree: &QuadTree,
    bodies: &[Body],
    params: &SimParams,
    num_workers: usize,
) -> Result<Vec<(usize, Vector2<f64>, Vector2<f64>)>, SimError> {
    let queues: Vec<Deque<Task<'_>>> = (0..num_workers).map(|_| Deque::new()).collect();
    for index in 0..bodies.len() {
        queues[index % num_workers].push(Task::Integrate(index));
    }
    for queue in &queues {
        queue.push(Task::Terminate);
    }

    let ctx = PhaseCtx {
        root: tree.root(),
        bodies,
        g: params.g,
        theta: params.theta,
        dt: params.dt,
    };
    run_workers(&queues, &ctx).map(|out| out.updates)
}

fn run_workers<'a>(
    queues: &[Deque<Task<'a>>],
    ctx: &PhaseCtx<'a>,
) -> Result<PhaseOutput, SimError> {
    thread::scope(|s| {
        let handles: Vec<_> = (0..queues.len())
            .map(|me| s.spawn(move || worker(me, queues, ctx)))
            .collect();

        let mut merged = PhaseOutput::default();
        for handle in handles {
            let out = handle.join().map_err(|_| SimError::WorkerPanic)??;
            merged.forces.extend(out.forces);
            merged.updates.extend(out.updates);
        }
        Ok(merged)
    })
}

fn worker<'a>(
    me: usize,
    queues: &[Deque<Task<'a>>],
    ctx: &PhaseCtx<'a>,
) -> Result<PhaseOutput, SimError> {
    let mut out = PhaseOutput::default();
    loop {
        let task = match queues[me].pop() {
            // own sentinel: exit without touching peers
            Some(Task::Terminate) => return Ok(out),
            Some(task) => task,
            None => match steal_from_peers(me, queues) {
                // a stolen sentinel belongs to the peer's own shutdown
                // accounting; drop it and keep scanning
                Some(Task::Terminate) => continue,
                Some(task) => task,
                None => return Ok(out),
            },
        };
        match task {
            Task::NodeForce(leaf) => {
                out.forces
                    .extend(gravity::leaf_forces(leaf, ctx.root, ctx.bodies, ctx.g, ctx.theta));
            }
            Task::Integrate(index) => {
                let (velocity, position) = integrator::step(&ctx.bodies[index], ctx.dt)?;
                out.updates.push((index, velocity, position));
            }
            Task::Terminate => return Ok(out),
        }
    }
}

fn steal_from_peers<'a>(me: usize, queues: &[Deque<Task<'a>>]) -> Option<Task<'a>> {
    queues
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != me)
        .find_map(|(_, queue)| queue.steal())
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::quadtree::Region;

    fn cluster() -> Vec<Body> {
        vec![
            Body::new("a", Vector2::new(0., 0.), Vector2::zeros(), 2.),
            Body::new("b", Vector2::new(3., 0.), Vector2::zeros(), 1.),
            Body::new("c", Vector2::new(0., 3.), Vector2::zeros(), 1.),
            Body::new("d", Vector2::new(-2., -2.), Vector2::zeros(), 4.),
            Body::new("e", Vector2::new(4., 4.), Vector2::zeros(), 0.5),
            Body::new("f", Vector2::new(-4., 3.), Vector2::zeros(), 1.5),
        ]
    }

    #[test]
    fn stolen_forces_match_sequential_evaluation() {
        let bodies = cluster();
        let params = SimParams {
            g: 1.,
            ..SimParams::default()
        };
        let tree = QuadTree::build(&bodies, Region::enclosing(&bodies, 1.)).unwrap();

        let mut sequential = vec![Vector2::zeros(); bodies.len()];
        for leaf in tree.occupied_leaves() {
            for (index, force) in
                gravity::leaf_forces(leaf, tree.root(), &bodies, params.g, params.theta)
            {
                sequential[index] = force;
            }
        }

        let mut stolen = vec![Vector2::zeros(); bodies.len()];
        for (index, force) in force_phase(&tree, &bodies, &params, 3).unwrap() {
            stolen[index] = force;
        }

        for (got, want) in stolen.iter().zip(&sequential) {
            assert_abs_diff_eq!(*got, *want, epsilon = 1e-12);
        }
    }

    #[test]
    fn more_workers_than_tasks_still_terminates() {
        let bodies = vec![
            Body::new("a", Vector2::new(0., 0.), Vector2::zeros(), 1.),
            Body::new("b", Vector2::new(1., 1.), Vector2::zeros(), 1.),
        ];
        let params = SimParams {
            g: 1.,
            ..SimParams::default()
        };
        let tree = QuadTree::build(&bodies, Region::enclosing(&bodies, 1.)).unwrap();

        let forces = force_phase(&tree, &bodies, &params, 8).unwrap();
        assert_eq!(forces.len(), 2);
    }

    #[test]
    fn integrate_phase_covers_every_body() {
        let mut bodies = cluster();
        for body in &mut bodies {
            body.force = Vector2::new(0.5, 0.25);
        }
        let params = SimParams {
            g: 1.,
            ..SimParams::default()
        };
        let tree = QuadTree::build(&bodies, Region::enclosing(&bodies, 1.)).unwrap();

        let mut updates = integrate_phase(&tree, &bodies, &params, 3).unwrap();
        updates.sort_by_key(|(index, _, _)| *index);

        assert_eq!(updates.len(), bodies.len());
        for (index, velocity, position) in updates {
            let (v, p) = integrator::step(&bodies[index], params.dt).unwrap();
            assert_eq!(velocity, v);
            assert_eq!(position, p);
        }
    }

    #[test]
    fn zero_mass_aborts_the_phase() {
        let mut bodies = cluster();
        bodies[0].mass = 0.;
        let params = SimParams::default();
        let tree = QuadTree::build(&bodies, Region::enclosing(&bodies, 1.)).unwrap();

        let err = integrate_phase(&tree, &bodies, &params, 2).unwrap_err();
        assert!(matches!(err, SimError::ZeroMass { .. }));
    }
}
