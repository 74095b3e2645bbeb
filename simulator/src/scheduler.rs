use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Picks which simulated host thread acts next. Time is virtual: one tick per step, and
/// sleeping tasks are parked until the clock reaches their wake time.
pub(crate) struct Scheduler {
    ready: Vec<usize>,
    sleeping: BinaryHeap<Reverse<(u64, usize)>>,
    pub(crate) now_ms: u64,
}

impl Scheduler {
    pub(crate) fn new(task_count: usize) -> Self {
        Self {
            ready: (0..task_count).collect(),
            sleeping: BinaryHeap::new(),
            now_ms: 0,
        }
    }

    pub(crate) fn sleep(&mut self, task_id: usize, duration_ms: u64) {
        let wake_at = self.now_ms.saturating_add(duration_ms.max(1));
        self.sleeping.push(Reverse((wake_at, task_id)));
    }

    pub(crate) fn tick(&mut self) {
        self.now_ms = self.now_ms.saturating_add(1);
        self.wake_due();
    }

    /// A random ready task; if none is ready, jump the clock to the next wake-up.
    pub(crate) fn next_ready(&mut self, rng: &mut ChaCha8Rng) -> Option<usize> {
        if self.ready.is_empty() {
            let Reverse((wake_at, _)) = *self.sleeping.peek()?;
            self.now_ms = self.now_ms.max(wake_at);
            self.wake_due();
        }
        let idx = rng.random_range(0..self.ready.len());
        Some(self.ready.swap_remove(idx))
    }

    pub(crate) fn mark_ready(&mut self, task_id: usize) {
        self.ready.push(task_id);
    }

    fn wake_due(&mut self) {
        while let Some(Reverse((wake_at, task_id))) = self.sleeping.peek().copied() {
            if wake_at > self.now_ms {
                break;
            }
            self.sleeping.pop();
            self.ready.push(task_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn sleeping_task_wakes_when_nothing_else_is_ready() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut scheduler = Scheduler::new(1);
        let task = scheduler.next_ready(&mut rng);
        assert_eq!(task, Some(0));
        scheduler.sleep(0, 25);
        assert_eq!(scheduler.next_ready(&mut rng), Some(0));
        assert_eq!(scheduler.now_ms, 25);
    }
}
