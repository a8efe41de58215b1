use nalgebra::Vector2;

use crate::{body::Body, error::SimError};

/// One semi-implicit Euler update from the body's accumulated force:
/// the velocity is kicked first and the position then drifts with the
/// already updated velocity.
///
/// Pure form used by the parallel schedulers; the new `(velocity,
/// position)` pair is applied by the driver at the phase boundary.
pub fn step(body: &Body, dt: f64) -> Result<(Vector2<f64>, Vector2<f64>), SimError> {
    if body.mass <= 0. {
        return Err(SimError::ZeroMass {
            name: body.name.clone(),
        });
    }
    let velocity = body.velocity + body.force / body.mass * dt;
    let position = body.position + velocity * dt;
    Ok((velocity, position))
}

/// Applies [`step`] in place.
pub fn advance(body: &mut Body, dt: f64) -> Result<(), SimError> {
    let (velocity, position) = step(body, dt)?;
    body.velocity = velocity;
    body.position = position;
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn kick_then_drift() {
        let mut body = Body::new("a", Vector2::new(1., 2.), Vector2::new(0.5, 0.), 2.);
        body.force = Vector2::new(4., -2.);

        advance(&mut body, 0.5).unwrap();

        // v = (0.5, 0) + (2, -1) * 0.5 = (1.5, -0.5)
        assert_abs_diff_eq!(body.velocity, Vector2::new(1.5, -0.5), epsilon = 1e-12);
        // p = (1, 2) + v * 0.5
        assert_abs_diff_eq!(body.position, Vector2::new(1.75, 1.75), epsilon = 1e-12);
    }

    #[test]
    fn zero_force_keeps_velocity() {
        let mut body = Body::new("a", Vector2::zeros(), Vector2::new(1., 1.), 1.);
        advance(&mut body, 0.01).unwrap();

        assert_eq!(body.velocity, Vector2::new(1., 1.));
        assert_abs_diff_eq!(body.position, Vector2::new(0.01, 0.01), epsilon = 1e-15);
    }

    #[test]
    fn zero_mass_is_fatal() {
        let body = Body::new("a", Vector2::zeros(), Vector2::zeros(), 0.);
        assert!(matches!(step(&body, 0.01), Err(SimError::ZeroMass { .. })));
    }
}
