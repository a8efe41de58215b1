//! Fixed worker pool over bounded shared queues.
//!
//! Workers drain a closed-when-complete queue and terminate naturally once
//! it is disconnected and empty; the enclosing thread scope is the barrier
//! between the force phase and the integration phase. Simple and balanced
//! for roughly uniform workloads, with no rebalancing: workers that finish
//! early idle until the barrier.

use std::thread;

use crossbeam_channel::bounded;
use nalgebra::Vector2;

use crate::{
    body::Body,
    error::SimError,
    gravity, integrator,
    quadtree::{QuadNode, QuadTree},
    SimParams,
};

use super::QUEUE_CAPACITY;

/// Force phase: every occupied leaf is enqueued breadth-first and evaluated
/// by one of `num_workers` workers. Returns one `(body_index, force)` pair
/// per body.
pub(crate) fn force_phase(
    tree: &QuadTree,
    bodies: &[Body],
    params: &SimParams,
    num_workers: usize,
) -> Vec<(usize, Vector2<f64>)> {
    let (task_tx, task_rx) = bounded::<&QuadNode>(QUEUE_CAPACITY);
    let (result_tx, result_rx) = bounded::<Vec<(usize, Vector2<f64>)>>(num_workers);
    let root = tree.root();
    let (g, theta) = (params.g, params.theta);

    thread::scope(|s| {
        for _ in 0..num_workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            s.spawn(move || {
                let mut local = Vec::new();
                for leaf in task_rx.iter() {
                    local.extend(gravity::leaf_forces(leaf, root, bodies, g, theta));
                }
                let _ = result_tx.send(local);
            });
        }
        drop(task_rx);
        drop(result_tx);

        for leaf in tree.occupied_leaves() {
            if task_tx.send(leaf).is_err() {
                break;
            }
        }
        // closing the queue is the workers' termination signal
        drop(task_tx);

        let mut forces = Vec::with_capacity(bodies.len());
        for local in result_rx.iter() {
            forces.extend(local);
        }
        forces
    })
}

/// Integration phase: body indices are consumed from a second bounded
/// queue. Returns the `(index, velocity, position)` updates to apply.
pub(crate) fn integrate_phase(
    bodies: &[Body],
    dt: f64,
    num_workers: usize,
) -> Result<Vec<(usize, Vector2<f64>, Vector2<f64>)>, SimError> {
    type Update = (usize, Vector2<f64>, Vector2<f64>);

    let (task_tx, task_rx) = bounded::<usize>(QUEUE_CAPACITY);
    let (result_tx, result_rx) = bounded::<Result<Vec<Update>, SimError>>(num_workers);

    thread::scope(|s| {
        for _ in 0..num_workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            s.spawn(move || {
                let mut local = Vec::new();
                let mut failure = None;
                for index in task_rx.iter() {
                    match integrator::step(&bodies[index], dt) {
                        Ok((velocity, position)) => local.push((index, velocity, position)),
                        Err(err) => {
                            failure = Some(err);
                            break;
                        }
                    }
                }
                let _ = result_tx.send(match failure {
                    Some(err) => Err(err),
                    None => Ok(local),
                });
            });
        }
        drop(task_rx);
        drop(result_tx);

        for index in 0..bodies.len() {
            if task_tx.send(index).is_err() {
                break;
            }
        }
        drop(task_tx);

        let mut updates = Vec::with_capacity(bodies.len());
        for local in result_rx.iter() {
            updates.extend(local?);
        }
        Ok(updates)
    })
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
        ]
    }

    #[test]
    fn pooled_forces_match_sequential_evaluation() {
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

        let mut pooled = vec![Vector2::zeros(); bodies.len()];
        for (index, force) in force_phase(&tree, &bodies, &params, 3) {
            pooled[index] = force;
        }

        for (p, s) in pooled.iter().zip(&sequential) {
            assert_abs_diff_eq!(*p, *s, epsilon = 1e-12);
        }
    }

    #[test]
    fn integrate_phase_covers_every_body() {
        let mut bodies = cluster();
        for body in &mut bodies {
            body.force = Vector2::new(1., -1.);
        }

        let mut updates = integrate_phase(&bodies, 0.01, 2).unwrap();
        updates.sort_by_key(|(index, _, _)| *index);

        assert_eq!(updates.len(), bodies.len());
        for (index, velocity, position) in updates {
            let (v, p) = integrator::step(&bodies[index], 0.01).unwrap();
            assert_eq!(velocity, v);
            assert_eq!(position, p);
        }
    }

    #[test]
    fn zero_mass_aborts_the_phase() {
        let mut bodies = cluster();
        bodies[2].mass = 0.;

        let err = integrate_phase(&bodies, 0.01, 2).unwrap_err();
        assert!(matches!(err, SimError::ZeroMass { .. }));
    }
}
