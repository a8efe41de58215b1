//! Parallel execution of the per-frame force and integration phases.
//!
//! Both schedulers split a frame into two data-parallel phases separated by
//! a full join: occupied leaves are evaluated first, and only once every
//! force result is in do the per-body integration tasks run. Workers never
//! mutate shared state; they return `(index, value)` batches that the
//! driver applies at the phase boundary.

mod deque;
pub(crate) mod pool;
pub(crate) mod stealing;

pub use deque::Deque;

use crate::quadtree::QuadNode;

/// Capacity of the pool scheduler's bounded task queues.
pub(crate) const QUEUE_CAPACITY: usize = 100;

/// A transient unit of per-frame work, created fresh each phase and
/// discarded after execution.
#[derive(Clone, Copy, Debug)]
pub enum Task<'a> {
    /// Evaluate the net force on every resident of an occupied leaf.
    NodeForce(&'a QuadNode),
    /// Integrate one body from its accumulated force.
    Integrate(usize),
    /// Worker shutdown sentinel.
    Terminate,
}
