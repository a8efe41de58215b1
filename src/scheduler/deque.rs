//! Lock-free double-ended task queue for the work-stealing scheduler.
//!
//! Slots form an append-only doubly-linked chain. The owner pops from the
//! head (FIFO), thieves steal from the tail, and a per-slot logical-deletion
//! flag decides every claim: whichever thread flips the flag first owns the
//! slot's value, so a task can never be delivered twice. The `head`/`tail`
//! pointers are advisory hints moved forward (respectively backward) by CAS
//! over already claimed slots.
//!
//! Reclamation: slots are never deallocated while the queue is shared.
//! The chain is owned by the `Deque` from allocation to `Drop`, which takes
//! `&mut self` and therefore runs only after every borrowing worker has
//! been joined. Tasks are transient (one scheduler phase), so retention is
//! bounded by the phase's task count.

use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

struct Slot<T> {
    /// `None` only for the initial placeholder slot.
    value: Option<T>,
    next: AtomicPtr<Slot<T>>,
    prev: AtomicPtr<Slot<T>>,
    claimed: AtomicBool,
}

impl<T> Slot<T> {
    fn alloc(value: Option<T>, claimed: bool) -> *mut Self {
        Box::into_raw(Box::new(Self {
            value,
            next: AtomicPtr::new(ptr::null_mut()),
            prev: AtomicPtr::new(ptr::null_mut()),
            claimed: AtomicBool::new(claimed),
        }))
    }
}

/// A lock-free deque delivering every pushed value exactly once across
/// concurrent `pop` and `steal` calls.
pub struct Deque<T: Copy> {
    head: AtomicPtr<Slot<T>>,
    tail: AtomicPtr<Slot<T>>,
    /// Start of the allocation chain, for `Drop`.
    first: *mut Slot<T>,
}

// SAFETY: all shared mutation goes through atomics; values are only read
// by the single thread that wins the `claimed` flag, and slots are only
// freed under `&mut self`.
unsafe impl<T: Copy + Send> Send for Deque<T> {}
unsafe impl<T: Copy + Send> Sync for Deque<T> {}

impl<T: Copy> Deque<T> {
    #[must_use]
    pub fn new() -> Self {
        let placeholder = Slot::alloc(None, true);
        Self {
            head: AtomicPtr::new(placeholder),
            tail: AtomicPtr::new(placeholder),
            first: placeholder,
        }
    }

    /// Appends at the tail. Contending pushers retry on the `next` CAS of
    /// whichever slot is currently last; nobody blocks.
    pub fn push(&self, value: T) {
        let slot = Slot::alloc(Some(value), false);
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            // the back link is published together with the slot
            unsafe { (*slot).prev.store(tail, Ordering::Relaxed) };
            let tail_ref = unsafe { &*tail };
            match tail_ref.next.compare_exchange(
                ptr::null_mut(),
                slot,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    let _ = self
                        .tail
                        .compare_exchange(tail, slot, Ordering::AcqRel, Ordering::Acquire);
                    return;
                }
                Err(next) => {
                    // stale tail hint, help it forward
                    let _ = self
                        .tail
                        .compare_exchange(tail, next, Ordering::AcqRel, Ordering::Acquire);
                }
            }
        }
    }

    /// Removes and returns the value nearest the head, or `None` when the
    /// queue is drained. FIFO from the owner's perspective.
    pub fn pop(&self) -> Option<T> {
        loop {
            let head = self.head.load(Ordering::Acquire);
            let next = unsafe { &*head }.next.load(Ordering::Acquire);
            if next.is_null() {
                return None;
            }
            let next_ref = unsafe { &*next };
            let lost = next_ref.claimed.swap(true, Ordering::AcqRel);
            // advance the hint past `next` whether we claimed it or lost it
            let _ = self
                .head
                .compare_exchange(head, next, Ordering::AcqRel, Ordering::Acquire);
            if !lost {
                return next_ref.value;
            }
        }
    }

    /// Removes and returns the value nearest the tail, or `None` when
    /// nothing is left to steal.
    pub fn steal(&self) -> Option<T> {
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let tail_ref = unsafe { &*tail };
            if tail_ref.value.is_none() {
                // retreated all the way to the placeholder
                return None;
            }
            let lost = tail_ref.claimed.swap(true, Ordering::AcqRel);
            let prev = tail_ref.prev.load(Ordering::Acquire);
            if !lost {
                if !prev.is_null() {
                    let _ = self
                        .tail
                        .compare_exchange(tail, prev, Ordering::AcqRel, Ordering::Acquire);
                }
                return tail_ref.value;
            }
            if prev.is_null() {
                return None;
            }
            // retreat the hint over the claimed slot and retry
            let _ = self
                .tail
                .compare_exchange(tail, prev, Ordering::AcqRel, Ordering::Acquire);
        }
    }
}

impl<T: Copy> Default for Deque<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> Drop for Deque<T> {
    fn drop(&mut self) {
        let mut cursor = self.first;
        while !cursor.is_null() {
            let slot = unsafe { Box::from_raw(cursor) };
            cursor = slot.next.load(Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn pop_is_fifo() {
        let deque = Deque::new();
        for i in 0..5 {
            deque.push(i);
        }

        for i in 0..5 {
            assert_eq!(deque.pop(), Some(i));
        }
        assert_eq!(deque.pop(), None);
    }

    #[test]
    fn steal_takes_from_the_tail() {
        let deque = Deque::new();
        for i in 0..4 {
            deque.push(i);
        }

        assert_eq!(deque.steal(), Some(3));
        assert_eq!(deque.steal(), Some(2));
        assert_eq!(deque.pop(), Some(0));
        assert_eq!(deque.pop(), Some(1));
        assert_eq!(deque.pop(), None);
        assert_eq!(deque.steal(), None);
    }

    #[test]
    fn pop_and_steal_meet_in_the_middle() {
        let deque = Deque::new();
        for i in 0..7 {
            deque.push(i);
        }

        let mut seen = Vec::new();
        loop {
            match deque.pop() {
                Some(v) => seen.push(v),
                None => break,
            }
            if let Some(v) = deque.steal() {
                seen.push(v);
            }
        }

        seen.sort_unstable();
        assert_eq!(seen, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn empty_deque_yields_nothing() {
        let deque: Deque<usize> = Deque::new();
        assert_eq!(deque.pop(), None);
        assert_eq!(deque.steal(), None);
    }

    #[test]
    fn concurrent_pop_and_steal_deliver_exactly_once() {
        const TASKS: usize = 1_000;
        const THIEVES: usize = 3;

        for _ in 0..20 {
            let deque = Deque::new();
            for i in 0..TASKS {
                deque.push(i);
            }

            let mut claimed: Vec<usize> = thread::scope(|s| {
                let owner = s.spawn(|| {
                    let mut got = Vec::new();
                    while let Some(v) = deque.pop() {
                        got.push(v);
                    }
                    got
                });
                let thieves: Vec<_> = (0..THIEVES)
                    .map(|_| {
                        s.spawn(|| {
                            let mut got = Vec::new();
                            while let Some(v) = deque.steal() {
                                got.push(v);
                            }
                            got
                        })
                    })
                    .collect();

                let mut all = owner.join().unwrap();
                for thief in thieves {
                    all.extend(thief.join().unwrap());
                }
                all
            });

            claimed.sort_unstable();
            assert_eq!(claimed, (0..TASKS).collect::<Vec<_>>());
        }
    }
}
