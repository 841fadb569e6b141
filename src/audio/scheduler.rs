// Cancellable timers owned by the controller
//
// Nothing here runs on its own: the controller pops due entries from
// `tick()`. Clearing the scheduler is therefore enough to guarantee that no
// stale timer fires after teardown.

use std::time::Instant;

/// Scheduling order, breaks ties between equal due times
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct TaskId(u64);

#[derive(Debug)]
struct Scheduled<A> {
    id: TaskId,
    due: Instant,
    action: A,
}

#[derive(Debug)]
pub struct Scheduler<A> {
    next_id: u64,
    pending: Vec<Scheduled<A>>,
}

impl<A> Default for Scheduler<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Scheduler<A> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            pending: Vec::new(),
        }
    }

    pub fn schedule(&mut self, due: Instant, action: A) {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.pending.push(Scheduled { id, due, action });
    }

    /// Remove every task matching `pred`, returning their due times and actions
    pub fn take_where(&mut self, mut pred: impl FnMut(&A) -> bool) -> Vec<(Instant, A)> {
        let mut taken = Vec::new();
        let mut kept = Vec::with_capacity(self.pending.len());
        for task in self.pending.drain(..) {
            if pred(&task.action) {
                taken.push((task.due, task.action));
            } else {
                kept.push(task);
            }
        }
        self.pending = kept;
        taken
    }

    pub fn cancel_where(&mut self, pred: impl FnMut(&A) -> bool) -> usize {
        self.take_where(pred).len()
    }

    pub fn clear(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// Pop the earliest task due at or before `now`. Ties fire in schedule order.
    pub fn pop_due(&mut self, now: Instant) -> Option<(Instant, A)> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, task)| task.due <= now)
            .min_by_key(|(_, task)| (task.due, task.id))
            .map(|(index, _)| index)?;
        let task = self.pending.remove(index);
        Some((task.due, task.action))
    }

    pub fn count_where(&self, mut pred: impl FnMut(&A) -> bool) -> usize {
        self.pending.iter().filter(|task| pred(&task.action)).count()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_pop_due_in_order() {
        let t0 = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.schedule(t0 + Duration::from_millis(30), "late");
        scheduler.schedule(t0 + Duration::from_millis(10), "early");
        scheduler.schedule(t0 + Duration::from_millis(10), "early-second");

        assert!(scheduler.pop_due(t0).is_none());

        let now = t0 + Duration::from_millis(50);
        assert_eq!(scheduler.pop_due(now).map(|(_, a)| a), Some("early"));
        assert_eq!(scheduler.pop_due(now).map(|(_, a)| a), Some("early-second"));
        assert_eq!(scheduler.pop_due(now).map(|(_, a)| a), Some("late"));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_take_where_keeps_due_time() {
        let t0 = Instant::now();
        let due = t0 + Duration::from_secs(2);
        let mut scheduler = Scheduler::new();
        scheduler.schedule(due, 'a');
        scheduler.schedule(t0, 'b');

        let taken = scheduler.take_where(|a| *a == 'a');

        assert_eq!(taken, vec![(due, 'a')]);
        assert_eq!(scheduler.count_where(|_| true), 1);
        assert_eq!(scheduler.pop_due(t0).map(|(_, a)| a), Some('b'));
    }

    #[test]
    fn test_clear() {
        let t0 = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.schedule(t0, ());
        scheduler.schedule(t0, ());

        assert_eq!(scheduler.clear(), 2);
        assert!(scheduler.pop_due(t0 + Duration::from_secs(60)).is_none());
    }
}
