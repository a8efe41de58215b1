use log::debug;
use nalgebra::Vector2;

use crate::{body::Body, quadtree::QuadNode};

/// Gravitational constant used when the input does not supply one.
pub const DEFAULT_G: f64 = 6.67430e-11;

/// Attractive force exerted on `(mass, position)` by `(other_mass,
/// other_position)`, pointing toward the attractor.
///
/// `None` at zero separation; the caller decides how to skip the
/// contribution.
fn pairwise(
    g: f64,
    mass: f64,
    position: Vector2<f64>,
    other_mass: f64,
    other_position: Vector2<f64>,
) -> Option<Vector2<f64>> {
    let r = other_position - position;
    let distance = r.norm();
    if distance == 0. {
        return None;
    }
    Some(r * (g * mass * other_mass) / (distance * distance * distance))
}

/// Net force on every resident of `leaf`, evaluated against the whole tree
/// with the opening-angle criterion `theta`.
///
/// Returns one `(body_index, force)` pair per resident. Leaves normally
/// hold one body; several residents only occur at maximum subdivision
/// depth, in which case intra-leaf pairs are summed directly.
#[must_use]
pub fn leaf_forces(
    leaf: &QuadNode,
    root: &QuadNode,
    bodies: &[Body],
    g: f64,
    theta: f64,
) -> Vec<(usize, Vector2<f64>)> {
    leaf.bodies()
        .iter()
        .map(|&index| {
            let body = &bodies[index];
            let mut force = Vector2::zeros();
            accumulate(leaf, root, bodies, index, g, theta, &mut force);
            for &other in leaf.bodies() {
                if other == index {
                    continue;
                }
                add_contribution(
                    &mut force,
                    pairwise(
                        g,
                        body.mass,
                        body.position,
                        bodies[other].mass,
                        bodies[other].position,
                    ),
                    body,
                );
            }
            (index, force)
        })
        .collect()
}

fn add_contribution(force: &mut Vector2<f64>, contribution: Option<Vector2<f64>>, body: &Body) {
    match contribution {
        Some(f) => *force += f,
        None => debug!("skipping zero-distance contribution for body {:?}", body.name),
    }
}

fn accumulate(
    leaf: &QuadNode,
    node: &QuadNode,
    bodies: &[Body],
    index: usize,
    g: f64,
    theta: f64,
    force: &mut Vector2<f64>,
) {
    let body = &bodies[index];
    for child in node.children().iter().flatten() {
        let child = child.as_ref();
        if std::ptr::eq(child, leaf) || child.total_mass() == 0. {
            continue;
        }

        let distance = (child.center() - body.position).norm();
        // distance == 0 yields an infinite ratio, which fails the test and
        // pushes evaluation down to the leaves where the degenerate pair is
        // skipped explicitly.
        let admissible = child.region().diagonal() / distance < theta;

        if admissible || (child.is_leaf() && child.bodies().len() == 1) {
            add_contribution(
                force,
                pairwise(g, body.mass, body.position, child.total_mass(), child.center()),
                body,
            );
        } else if child.is_leaf() {
            // max-depth leaf with several residents: sum them individually
            for &other in child.bodies() {
                add_contribution(
                    force,
                    pairwise(
                        g,
                        body.mass,
                        body.position,
                        bodies[other].mass,
                        bodies[other].position,
                    ),
                    body,
                );
            }
        } else {
            accumulate(leaf, child, bodies, index, g, theta, force);
        }
    }
}

/// Exact pairwise oracle, quadratic in the number of bodies.
#[must_use]
pub fn brute_force(bodies: &[Body], g: f64) -> Vec<Vector2<f64>> {
    bodies
        .iter()
        .enumerate()
        .map(|(i, body)| {
            let mut force = Vector2::zeros();
            for (j, other) in bodies.iter().enumerate() {
                if i == j {
                    continue;
                }
                add_contribution(
                    &mut force,
                    pairwise(g, body.mass, body.position, other.mass, other.position),
                    body,
                );
            }
            force
        })
        .collect()
}
