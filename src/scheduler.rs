//! Cooperative task scheduler.
//!
//! Both node roles run a single main loop ticking several logical tasks at
//! independent cadences (sampling, dispatch, discovery, watchdog). The
//! scheduler notifies a [`TaskDelegate`] when a task is due; the main loop
//! implements the delegate and does the actual work, then sleeps until
//! [`next_deadline`](TaskScheduler::next_deadline).
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  sample   dispatch   discovery   watchdog   (per period)   │
//! │     │         │          │           │                     │
//! │     ▼         ▼          ▼           ▼                     │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │                 TaskDelegate                         │  │
//! │  │        (main loop runs the due task's body)          │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The scheduler itself knows nothing about devices or transports, which
//! keeps it independently testable and shared between the two binaries.

use log::info;

/// Maximum number of concurrent tasks (stack-allocated).
pub const MAX_TASKS: usize = 8;

/// Slot index returned by [`TaskScheduler::add`].
pub type TaskId = usize;

/// Callback the scheduler invokes for every due task.
pub trait TaskDelegate {
    fn on_task_due(&mut self, task: TaskId, label: &'static str);
}

#[derive(Debug, Clone)]
struct TaskEntry {
    label: &'static str,
    period_ms: u32,
    next_due_ms: u64,
    enabled: bool,
}

pub struct TaskScheduler {
    tasks: [Option<TaskEntry>; MAX_TASKS],
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self {
            tasks: [const { None }; MAX_TASKS],
        }
    }

    /// Add a task due immediately and then every `period_ms`. Returns the
    /// slot index, or `None` if all slots are taken.
    pub fn add(&mut self, label: &'static str, period_ms: u32, now_ms: u64) -> Option<TaskId> {
        for (i, slot) in self.tasks.iter_mut().enumerate() {
            if slot.is_none() {
                info!("scheduler: added '{label}' at slot {i} ({period_ms} ms)");
                *slot = Some(TaskEntry {
                    label,
                    period_ms,
                    next_due_ms: now_ms,
                    enabled: true,
                });
                return Some(i);
            }
        }
        None // All slots full.
    }

    /// Change a task's period (e.g. when a host advertises its rate). Takes
    /// effect from the next fire.
    pub fn set_period(&mut self, task: TaskId, period_ms: u32) {
        if let Some(Some(entry)) = self.tasks.get_mut(task) {
            entry.period_ms = period_ms;
        }
    }

    pub fn set_enabled(&mut self, task: TaskId, enabled: bool) {
        if let Some(Some(entry)) = self.tasks.get_mut(task) {
            entry.enabled = enabled;
        }
    }

    /// Push a task's next fire out to `now + delay_ms` (used for the
    /// discovery retry delay).
    pub fn defer(&mut self, task: TaskId, delay_ms: u32, now_ms: u64) {
        if let Some(Some(entry)) = self.tasks.get_mut(task) {
            entry.next_due_ms = now_ms + u64::from(delay_ms);
        }
    }

    /// Fire every due task once and reschedule it. Returns how many fired.
    ///
    /// Rescheduling is anchored to `now` rather than the nominal deadline:
    /// if the loop fell behind, tasks do not burst to catch up.
    pub fn poll(&mut self, now_ms: u64, delegate: &mut dyn TaskDelegate) -> usize {
        let mut fired = 0;
        for (i, slot) in self.tasks.iter_mut().enumerate() {
            let entry = match slot {
                Some(e) if e.enabled => e,
                _ => continue,
            };
            if now_ms < entry.next_due_ms {
                continue;
            }
            entry.next_due_ms = now_ms + u64::from(entry.period_ms);
            let label = entry.label;
            delegate.on_task_due(i, label);
            fired += 1;
        }
        fired
    }

    /// Earliest pending deadline, for the main loop's sleep. `None` when
    /// nothing is enabled.
    pub fn next_deadline(&self, now_ms: u64) -> Option<u64> {
        self.tasks
            .iter()
            .flatten()
            .filter(|e| e.enabled)
            .map(|e| e.next_due_ms.max(now_ms))
            .min()
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
