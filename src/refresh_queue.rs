//! Deferred engagement-refresh scheduling
//!
//! After a publish, engagement numbers are not worth fetching immediately;
//! the facade enqueues a refresh task due after a configured delay. The queue
//! holds no timers: a caller (worker loop, cron tick, test) drains
//! [`RefreshQueue::take_due`] and runs the refresher itself, so refresh work
//! is observable and survives being driven by whatever scheduler the host
//! application already has.

use std::collections::VecDeque;
use std::sync::Mutex;

/// What a deferred refresh task should fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    Metrics,
    Comments,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTask {
    pub post_id: String,
    pub kind: RefreshKind,
    pub due_at: i64,
}

#[derive(Default)]
pub struct RefreshQueue {
    tasks: Mutex<VecDeque<RefreshTask>>,
}

impl RefreshQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a refresh task. Duplicate (post, kind) tasks already queued
    /// and not yet due are collapsed to the earlier due time.
    pub fn schedule(&self, post_id: &str, kind: RefreshKind, due_at: i64) {
        let mut tasks = match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(existing) = tasks
            .iter_mut()
            .find(|t| t.post_id == post_id && t.kind == kind)
        {
            existing.due_at = existing.due_at.min(due_at);
            return;
        }

        tasks.push_back(RefreshTask {
            post_id: post_id.to_string(),
            kind,
            due_at,
        });
    }

    /// Remove and return every task due at or before `now`.
    pub fn take_due(&self, now: i64) -> Vec<RefreshTask> {
        let mut tasks = match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut due = Vec::new();
        let mut remaining = VecDeque::with_capacity(tasks.len());
        for task in tasks.drain(..) {
            if task.due_at <= now {
                due.push(task);
            } else {
                remaining.push_back(task);
            }
        }
        *tasks = remaining;
        due
    }

    pub fn len(&self) -> usize {
        match self.tasks.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_due_returns_only_ripe_tasks_in_order() {
        let queue = RefreshQueue::new();
        queue.schedule("p1", RefreshKind::Metrics, 100);
        queue.schedule("p2", RefreshKind::Comments, 200);
        queue.schedule("p3", RefreshKind::Metrics, 150);

        let due = queue.take_due(150);
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].post_id, "p1");
        assert_eq!(due[1].post_id, "p3");
        assert_eq!(queue.len(), 1);

        let due = queue.take_due(500);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].post_id, "p2");
        assert!(queue.is_empty());
    }

    #[test]
    fn duplicate_schedules_collapse_to_earliest() {
        let queue = RefreshQueue::new();
        queue.schedule("p1", RefreshKind::Metrics, 300);
        queue.schedule("p1", RefreshKind::Metrics, 100);
        queue.schedule("p1", RefreshKind::Comments, 300);

        assert_eq!(queue.len(), 2);
        let due = queue.take_due(100);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].kind, RefreshKind::Metrics);
    }

    #[test]
    fn nothing_due_before_deadline() {
        let queue = RefreshQueue::new();
        queue.schedule("p1", RefreshKind::Comments, 100);
        assert!(queue.take_due(99).is_empty());
        assert_eq!(queue.len(), 1);
    }
}
