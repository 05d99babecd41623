//! # Scheduler
//!
//! A cooperative, single-threaded step-runner. Animated actions (attacks,
//! enemy turns, screen fades) are submitted as tasks; once per frame the
//! encounter calls [`Scheduler::tick`], which advances every unblocked live
//! task exactly one step, in submission order.
//!
//! A step can suspend its task: on a fixed duration, on an edge-triggered
//! key press, or on a child task. Suspension spawns an internal child
//! record and marks the parent blocked; the parent never advances in the
//! tick its child finishes, only from the next tick on. That determinism is
//! what keeps animation sequencing reproducible.
//!
//! [`Scheduler::clear`] drops every task unconditionally with no completion
//! callbacks; whatever a task mutated before cancellation stays mutated.

use crate::services::{InputSource, Key};

/// Handle to a task record in the scheduler's arena.
///
/// Ids are arena indices and are never reused within an encounter; `clear`
/// resets the arena wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub(crate) usize);

/// Per-tick environment handed to every advancing task.
pub struct TickContext<'a> {
    /// Seconds elapsed since the previous tick
    pub dt: f32,
    /// Edge- and level-triggered key state
    pub input: &'a dyn InputSource,
}

/// What a task's step decided.
pub enum Step<W> {
    /// Re-poll next tick
    Continue,
    /// The task is exhausted
    Done,
    /// Suspend until the accumulated tick deltas reach the duration
    WaitSeconds(f32),
    /// Suspend until the key is freshly pressed
    WaitForKey(Key),
    /// Suspend until the child task is exhausted
    WaitFor(Box<dyn Task<W>>),
}

/// A suspended action sequence, advanced one step per tick.
pub trait Task<W> {
    fn step(&mut self, world: &mut W, ctx: &TickContext) -> Step<W>;
}

enum TaskBody<W> {
    User(Box<dyn Task<W>>),
    Delay { duration: f32, elapsed: f32 },
    KeyPress { key: Key },
}

struct TaskRecord<W> {
    body: TaskBody<W>,
    blocked_on: Option<TaskId>,
    done: bool,
}

/// Arena of live task records, polled once per external tick.
pub struct Scheduler<W> {
    slots: Vec<Option<TaskRecord<W>>>,
}

impl<W> Default for Scheduler<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> Scheduler<W> {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Enqueues a new top-level task.
    pub fn submit(&mut self, task: impl Task<W> + 'static) -> TaskId {
        log::debug!("scheduler: task submitted at slot {}", self.slots.len());
        self.enqueue(TaskBody::User(Box::new(task)))
    }

    /// Enqueues a bare fixed-duration delay.
    pub fn submit_delay(&mut self, seconds: f32) -> TaskId {
        self.enqueue(TaskBody::Delay {
            duration: seconds,
            elapsed: 0.0,
        })
    }

    /// True iff any task is live.
    pub fn is_active(&self) -> bool {
        self.slots.iter().any(|s| s.is_some())
    }

    /// Drops all tasks unconditionally. No completion callbacks fire, and
    /// mutations already applied by half-run tasks are not rolled back.
    pub fn clear(&mut self) {
        if self.is_active() {
            log::debug!("scheduler: cleared with tasks in flight");
        }
        self.slots.clear();
    }

    /// Advances every unblocked live task exactly one step, in submission
    /// order. Children spawned this tick first advance next tick; parents
    /// of tasks finishing this tick resume next tick.
    pub fn tick(&mut self, world: &mut W, ctx: &TickContext) {
        let snapshot: Vec<usize> = (0..self.slots.len())
            .filter(|&i| self.slots[i].is_some())
            .collect();

        for id in snapshot {
            let Some(mut record) = self.slots[id].take() else {
                continue;
            };

            if let Some(dep) = record.blocked_on {
                let dep_live = self.slots.get(dep.0).map_or(false, |s| s.is_some());
                if dep_live {
                    self.slots[id] = Some(record);
                    continue;
                }
                // The dependency was cleared out from under us; treat the
                // task as immediately unblocked.
                record.blocked_on = None;
            }

            match &mut record.body {
                TaskBody::Delay { duration, elapsed } => {
                    *elapsed += ctx.dt;
                    if *elapsed >= *duration {
                        record.done = true;
                    }
                }
                TaskBody::KeyPress { key } => {
                    if ctx.input.has_been_pressed(*key) {
                        record.done = true;
                    }
                }
                TaskBody::User(task) => match task.step(world, ctx) {
                    Step::Continue => {}
                    Step::Done => record.done = true,
                    Step::WaitSeconds(duration) => {
                        let child = self.enqueue(TaskBody::Delay {
                            duration,
                            elapsed: 0.0,
                        });
                        record.blocked_on = Some(child);
                    }
                    Step::WaitForKey(key) => {
                        let child = self.enqueue(TaskBody::KeyPress { key });
                        record.blocked_on = Some(child);
                    }
                    Step::WaitFor(task) => {
                        let child = self.enqueue(TaskBody::User(task));
                        record.blocked_on = Some(child);
                    }
                },
            }

            self.slots[id] = Some(record);
        }

        // Remove exhausted tasks only after the whole pass, so a task that
        // finished this tick still counts as blocking its parent.
        let removed: Vec<usize> = (0..self.slots.len())
            .filter(|&i| self.slots[i].as_ref().is_some_and(|r| r.done))
            .collect();
        for &id in &removed {
            self.slots[id] = None;
        }
        for record in self.slots.iter_mut().flatten() {
            if let Some(dep) = record.blocked_on {
                if removed.contains(&dep.0) {
                    record.blocked_on = None;
                }
            }
        }
    }

    fn enqueue(&mut self, body: TaskBody<W>) -> TaskId {
        self.slots.push(Some(TaskRecord {
            body,
            blocked_on: None,
            done: false,
        }));
        TaskId(self.slots.len() - 1)
    }
}
