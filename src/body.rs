use nalgebra::Vector2;

/// A single simulated body.
///
/// Bodies are owned by the simulation driver as one contiguous slice; the
/// quadtree and the schedulers refer to them by index into that slice and
/// never copy them. `force` is an accumulator that is overwritten at the
/// start of every force pass.
#[derive(Clone, Debug)]
pub struct Body {
    /// Unique within one run, used only to correlate output rows.
    pub name: String,
    pub position: Vector2<f64>,
    pub velocity: Vector2<f64>,
    pub mass: f64,
    pub force: Vector2<f64>,
}

impl Body {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        position: Vector2<f64>,
        velocity: Vector2<f64>,
        mass: f64,
    ) -> Self {
        Self {
            name: name.into(),
            position,
            velocity,
            mass,
            force: Vector2::zeros(),
        }
    }
}
